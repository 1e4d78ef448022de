//! # arms-core
//!
//! Core types, traits, and abstractions for the ARMS document lifecycle.
//!
//! ARMS forms (events, publications, awards, funding, ...) attach a supporting
//! document to each record. This crate defines the shared vocabulary for that
//! workflow: document references and their path shapes, the per-session
//! upload intent, extraction results, field-rule descriptors, and the traits
//! of every external collaborator (staging area, durable object store,
//! extraction service, option catalog, record backend, notifier).
//!
//! ## Logging
//!
//! All crates log through `tracing` with a shared set of structured field
//! names: `subsystem`, `op`, `session_id`, `owner_id`, `record_id`,
//! `category`, `document_path`, `form_type`, `field`, `duration_ms`,
//! `field_count`, `error`.
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue (cleanup delete failed, extraction failed) |
//! | INFO  | Lifecycle events (promotion, save, cancel), startup/shutdown |
//! | DEBUG | Decision points (unchanged passthrough, skipped delete) |
//! | TRACE | Per-field reconciliation decisions |

pub mod catalog;
pub mod defaults;
pub mod document;
pub mod error;
pub mod file_safety;
pub mod forms;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use catalog::StaticOptionCatalog;
pub use document::{validate_durable_path, DocumentKind, DocumentRef, DocumentState};
pub use error::{Error, ErrorKind, Result};
pub use file_safety::{detect_content_type, sanitize_filename, validate_upload};
pub use forms::{FieldKind, FieldRule, FormRegistry, FormSchema, RecordKind};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{new_v7, temporary_key};
