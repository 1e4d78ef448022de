//! Collaborator traits consumed by the document lifecycle.
//!
//! Each external capability (staging area, object store, extraction model,
//! option catalog, record backend, user notifications) is a trait so the
//! lifecycle can be driven by real adapters in production and by in-memory
//! doubles in tests.

use async_trait::async_trait;

use crate::document::DocumentRef;
use crate::forms::{FormSchema, RecordKind};
use crate::models::{
    DeleteOutcome, ExtractedFieldSet, FieldOption, Notice, Placement, RecordPayload, StagedFile,
    StoredRecord,
};
use crate::Result;

// =============================================================================
// STORAGE TRAITS
// =============================================================================

/// Local area holding freshly selected files before any durable decision.
///
/// Staged files that are never promoted are abandoned; the lifecycle never
/// deletes from staging.
#[async_trait]
pub trait StagingStore: Send + Sync {
    /// Hold a file and return its `Staged` reference.
    async fn stage(&self, file: StagedFile) -> Result<DocumentRef>;

    /// Read a staged file back by its staged path.
    async fn read(&self, staged_path: &str) -> Result<StagedFile>;
}

/// Long-term document store.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Promote a staged file. Returns the durable path.
    ///
    /// Transport failures are `Error::Upload`. The returned path is validated
    /// by the caller, not trusted.
    async fn put(&self, staged_path: &str, placement: &Placement) -> Result<String>;

    /// Best-effort delete. Failures are reported in the outcome, never raised.
    async fn delete(&self, durable_path: &str) -> DeleteOutcome;

    /// Whether a durable path currently exists. Probe failures report `false`.
    async fn exists(&self, durable_path: &str) -> bool;

    /// Human-readable name of this store.
    fn name(&self) -> &str;
}

// =============================================================================
// EXTRACTION TRAITS
// =============================================================================

/// Service that turns a staged document into best-effort field values.
///
/// Pure input to output: no side effects on any store. Output is advisory
/// and always passes through reconciliation.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(
        &self,
        document: &StagedFile,
        schema: &FormSchema,
    ) -> Result<ExtractedFieldSet>;

    /// Check if the service's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this service.
    fn name(&self) -> &str;
}

/// Source of dropdown options, keyed by catalog key.
#[async_trait]
pub trait OptionCatalog: Send + Sync {
    /// Options currently valid for a catalog key. Unknown keys yield an empty list.
    async fn options(&self, key: &str) -> Result<Vec<FieldOption>>;
}

// =============================================================================
// BACKEND TRAITS
// =============================================================================

/// Backend write of a finalized record.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Insert (`record_id == None`) or update a record.
    async fn write(
        &self,
        kind: RecordKind,
        owner_id: i64,
        record_id: Option<i64>,
        payload: RecordPayload,
    ) -> Result<StoredRecord>;
}

/// User-visible notification channel.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
