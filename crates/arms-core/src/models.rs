//! Value objects shared across the document lifecycle.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::defaults::TEMP_RECORD_PREFIX;
use crate::document::DocumentRef;
use crate::forms::RecordKind;

/// Flat record payload handed to the backend.
pub type RecordPayload = Map<String, JsonValue>;

// =============================================================================
// UPLOAD INTENT
// =============================================================================

/// Per-session document intent.
///
/// Created when a form opens, mutated on file selection and successful
/// promotion, discarded when the form closes. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadIntent {
    /// Snapshot taken when the form opened (`None` in add mode).
    pub original: DocumentRef,
    /// Live value bound to the form field.
    pub current: DocumentRef,
    pub owner_id: i64,
    /// `None` until the record exists.
    pub record_id: Option<i64>,
    /// Logical folder in the durable store.
    pub category: String,
}

impl UploadIntent {
    pub fn for_add(owner_id: i64, category: impl Into<String>) -> Self {
        Self {
            original: DocumentRef::None,
            current: DocumentRef::None,
            owner_id,
            record_id: None,
            category: category.into(),
        }
    }

    pub fn for_edit(
        owner_id: i64,
        record_id: i64,
        category: impl Into<String>,
        original: DocumentRef,
    ) -> Self {
        Self {
            current: original.clone(),
            original,
            owner_id,
            record_id: Some(record_id),
            category: category.into(),
        }
    }

    /// Whether the bound document differs from the snapshot.
    pub fn changed(&self) -> bool {
        self.current != self.original
    }

    /// Placement metadata for promoting the current document.
    ///
    /// Records without an id use `temporary_id` as their key.
    pub fn placement(&self, temporary_id: &str) -> Placement {
        let record_key = match self.record_id {
            Some(id) => id.to_string(),
            None => format!("{}{}", TEMP_RECORD_PREFIX, temporary_id),
        };
        Placement {
            owner_id: self.owner_id,
            record_key,
            category: self.category.clone(),
        }
    }
}

/// Where a promoted document should be placed in the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub owner_id: i64,
    /// Record id, or a temporary key in add flow.
    pub record_key: String,
    pub category: String,
}

// =============================================================================
// FILES
// =============================================================================

/// A file selected by the user, as held in the staging area.
#[derive(Clone, Serialize, Deserialize)]
pub struct StagedFile {
    pub filename: String,
    pub content_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl StagedFile {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Lowercased extension of the filename, if any.
    pub fn extension(&self) -> Option<String> {
        file_extension(&self.filename)
    }
}

impl std::fmt::Debug for StagedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

/// Lowercased extension of a filename or path.
pub fn file_extension(name: &str) -> Option<String> {
    let base = name.rsplit('/').next().unwrap_or(name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Outcome of a best-effort durable delete. Never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOutcome {
    pub success: bool,
    pub message: String,
}

impl DeleteOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// =============================================================================
// EXTRACTION
// =============================================================================

/// Result of one extraction call.
///
/// Raw, untyped values keyed by field name. Consumed exactly once by the
/// reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFieldSet {
    pub fields: BTreeMap<String, JsonValue>,
    #[serde(default)]
    pub confidence: f64,
}

impl ExtractedFieldSet {
    pub fn new(fields: BTreeMap<String, JsonValue>, confidence: f64) -> Self {
        Self { fields, confidence }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Dropdown option as supplied by an option catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub id: i64,
    pub name: String,
}

impl FieldOption {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Field names currently showing machine-filled treatment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AutoFilledFieldSet(BTreeSet<String>);

impl AutoFilledFieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn insert(&mut self, field: impl Into<String>) {
        self.0.insert(field.into());
    }

    /// Drop highlighting from a field the user touched.
    pub fn remove(&mut self, field: &str) -> bool {
        self.0.remove(field)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Replace the whole set with the latest pass.
    pub fn replace_with<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0 = fields.into_iter().map(Into::into).collect();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Policy for writing reconciled values into the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Overwrite regardless of existing values.
    #[default]
    Replace,
    /// Write only into fields that are currently empty.
    FillEmptyOnly,
}

// =============================================================================
// SAVE
// =============================================================================

/// Record-level save policy supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOptions {
    #[serde(default)]
    pub document_required: bool,
}

impl SaveOptions {
    pub fn document_required() -> Self {
        Self {
            document_required: true,
        }
    }
}

/// A record as acknowledged by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    pub kind: RecordKind,
    pub owner_id: i64,
    pub payload: RecordPayload,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedRecord {
    pub record: StoredRecord,
    /// Resolved document path written into the payload.
    pub document: DocumentRef,
    /// Superseded durable path scheduled for cleanup, if any.
    pub superseded: Option<String>,
    /// Whether the cleanup delete succeeded (or was unnecessary).
    pub cleanup_ok: bool,
}

// =============================================================================
// NOTICES
// =============================================================================

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Blocking: the operation failed and the form stays open.
    Blocking,
    /// Dismissible information or advisory failure.
    Transient,
}

/// User-visible notification emitted by the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn blocking(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Blocking,
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Transient,
            message: message.into(),
        }
    }

    /// Notice for a failed operation: blocking with details when the error
    /// aborts a save, a transient hint otherwise.
    pub fn for_error(error: &crate::Error) -> Self {
        if error.is_fatal_to_save() {
            Self::blocking(format!("{}: {}", error.failed_step(), error))
        } else {
            Self::transient(error.failed_step())
        }
    }
}
