//! Notifier implementations.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use arms_core::{Notice, NoticeLevel, Notifier};

/// Buffers notices until a UI caller drains them.
#[derive(Debug, Clone, Default)]
pub struct NoticeBuffer {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every pending notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut n| std::mem::take(&mut *n))
            .unwrap_or_default()
    }

    /// Pending notices without removing them.
    pub fn pending(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

impl Notifier for NoticeBuffer {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}

/// Renders notices as log events when no UI is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Blocking => warn!(subsystem = "notice", level = "blocking", "{}", notice.message),
            NoticeLevel::Transient => info!(subsystem = "notice", level = "transient", "{}", notice.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_drains_in_order() {
        let buffer = NoticeBuffer::new();
        buffer.notify(Notice::transient("3 fields updated"));
        buffer.notify(Notice::blocking("document upload failed"));

        assert_eq!(buffer.pending().len(), 2);
        let drained = buffer.drain();
        assert_eq!(drained[0].message, "3 fields updated");
        assert_eq!(drained[1].level, NoticeLevel::Blocking);
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn test_clones_share_buffer() {
        let buffer = NoticeBuffer::new();
        let handle: Arc<dyn Notifier> = Arc::new(buffer.clone());
        handle.notify(Notice::transient("saved"));
        assert_eq!(buffer.drain().len(), 1);
    }
}
