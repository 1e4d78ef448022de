//! # arms-lifecycle
//!
//! Document lifecycle engine for ARMS forms.
//!
//! This crate provides:
//! - [`DocumentLifecycle`]: staging on selection, optional extraction,
//!   promotion on save, superseded-document cleanup, and store-free cancel
//! - [`FieldReconciler`]: rule-checked merging of extracted values into a
//!   form draft, with auto-fill highlighting
//! - [`FormSession`]: original snapshot, draft, dirty flag and highlights
//! - Notifier implementations for UI buffers and plain logging
//!
//! # Feature Flags
//!
//! - `mock`: Enable `RecordingDurableStore` and `ScriptedExtractor` for
//!   downstream tests
//!
//! # Example
//!
//! ```rust,ignore
//! use arms_lifecycle::{DocumentLifecycle, LifecycleConfig, LifecycleServices};
//!
//! let mut lifecycle = DocumentLifecycle::open_add(services, LifecycleConfig::from_env(), schema, owner_id);
//! lifecycle.on_file_selected(file).await?;
//! lifecycle.run_extraction(ReconcileMode::Replace).await.ok();
//! let saved = lifecycle.save(SaveOptions::document_required()).await?;
//! ```

pub mod config;
pub mod manager;
pub mod notify;
pub mod reconciler;
pub mod session;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

// Re-export core types
pub use arms_core::*;

pub use config::LifecycleConfig;
pub use manager::{DocumentLifecycle, ExtractionTicket, LifecycleServices, SessionView};
pub use notify::{NoticeBuffer, TracingNotifier};
pub use reconciler::{is_empty_value, FieldOutcome, FieldReconciler, ReconcileReport};
pub use session::FormSession;

#[cfg(any(test, feature = "mock"))]
pub use mock::{PutScript, RecordingDurableStore, ScriptedExtractor, StoreCall};
