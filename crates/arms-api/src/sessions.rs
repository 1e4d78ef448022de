//! Open form sessions held by the server.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use arms_lifecycle::{DocumentLifecycle, Notice, NoticeBuffer};

/// One open form and the notices it has not reported yet.
pub struct SessionEntry {
    pub lifecycle: DocumentLifecycle,
    pub notices: NoticeBuffer,
    last_used: Instant,
}

impl SessionEntry {
    pub fn new(lifecycle: DocumentLifecycle, notices: NoticeBuffer) -> Self {
        Self {
            lifecycle,
            notices,
            last_used: Instant::now(),
        }
    }

    pub fn drain_notices(&self) -> Vec<Notice> {
        self.notices.drain()
    }
}

pub type SharedSession = Arc<Mutex<SessionEntry>>;

/// Sessions by id. Each session is locked on its own so a long extraction
/// in one form never blocks another.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, SharedSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, entry: SessionEntry) -> Uuid {
        let id = entry.lifecycle.id();
        self.sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(entry)));
        id
    }

    /// Look up a session and mark it used.
    pub async fn get(&self, id: Uuid) -> Option<SharedSession> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        if let Ok(mut entry) = session.try_lock() {
            entry.last_used = Instant::now();
        }
        Some(session)
    }

    pub async fn remove(&self, id: Uuid) -> Option<SharedSession> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for longer than `idle`. Busy sessions are kept.
    pub async fn purge_idle(&self, idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, session| match session.try_lock() {
            Ok(entry) if entry.last_used.elapsed() > idle => {
                debug!(subsystem = "api", session_id = %id, "Purging idle session");
                false
            }
            _ => true,
        });
        before - sessions.len()
    }

    /// Periodically purge idle sessions in the background.
    pub fn spawn_sweeper(&self, idle: Duration, every: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let purged = registry.purge_idle(idle).await;
                if purged > 0 {
                    info!(subsystem = "api", purged, "Idle sessions purged");
                }
            }
        })
    }
}
