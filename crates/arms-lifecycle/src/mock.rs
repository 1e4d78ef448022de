//! Recording test doubles for lifecycle collaborators.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arms_lifecycle::mock::{PutScript, RecordingDurableStore, StoreCall};
//!
//! let store = RecordingDurableStore::new()
//!     .with_existing("upload/Events/5_1001.pdf")
//!     .with_put_results([PutScript::Fail("network down".into())]);
//! // ... drive a lifecycle ...
//! assert!(matches!(store.calls()[0], StoreCall::Put { .. }));
//! ```

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use arms_core::defaults::{DURABLE_PREFIX, FALLBACK_EXTENSION};
use arms_core::{
    file_extension, DeleteOutcome, DurableStore, Error, ExtractedFieldSet, ExtractionService,
    FormSchema, Placement, Result, StagedFile,
};

/// One call made against a [`RecordingDurableStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Put {
        staged_path: String,
        placement: Placement,
    },
    Delete(String),
    Exists(String),
}

impl StoreCall {
    pub fn is_put(&self) -> bool {
        matches!(self, StoreCall::Put { .. })
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, StoreCall::Delete(_))
    }
}

/// Scripted result for the next `put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutScript {
    /// Return this path as-is (it is not validated by the store).
    Path(String),
    /// Fail with `Error::Upload`.
    Fail(String),
}

#[derive(Debug, Default)]
struct RecordingState {
    put_script: VecDeque<PutScript>,
    existing: HashSet<String>,
    fail_deletes: bool,
}

/// Durable store that logs every call in order.
///
/// Without a script, `put` returns the canonical key for the placement.
#[derive(Clone, Default)]
pub struct RecordingDurableStore {
    calls: Arc<Mutex<Vec<StoreCall>>>,
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a durable path as already stored.
    pub fn with_existing(self, path: impl Into<String>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.existing.insert(path.into());
        }
        self
    }

    /// Queue results for the next `put` calls.
    pub fn with_put_results<I>(self, results: I) -> Self
    where
        I: IntoIterator<Item = PutScript>,
    {
        if let Ok(mut state) = self.state.lock() {
            state.put_script.extend(results);
        }
        self
    }

    /// Make every delete report failure.
    pub fn with_failing_deletes(self) -> Self {
        self.set_failing_deletes(true);
        self
    }

    pub fn set_failing_deletes(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.fail_deletes = fail;
        }
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn put_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_put()).count()
    }

    /// Paths passed to `delete`, in order.
    pub fn deleted_paths(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Delete(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Whether `path` is currently stored.
    pub fn contains(&self, path: &str) -> bool {
        self.state
            .lock()
            .map(|s| s.existing.contains(path))
            .unwrap_or(false)
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    fn record(&self, call: StoreCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl DurableStore for RecordingDurableStore {
    async fn put(&self, staged_path: &str, placement: &Placement) -> Result<String> {
        self.record(StoreCall::Put {
            staged_path: staged_path.to_string(),
            placement: placement.clone(),
        });

        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Internal("recording store lock poisoned".to_string()))?;
        let path = match state.put_script.pop_front() {
            Some(PutScript::Fail(message)) => return Err(Error::Upload(message)),
            Some(PutScript::Path(path)) => path,
            None => format!(
                "{}{}/{}_{}.{}",
                DURABLE_PREFIX,
                placement.category,
                placement.owner_id,
                placement.record_key,
                file_extension(staged_path).unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
            ),
        };
        state.existing.insert(path.clone());
        Ok(path)
    }

    async fn delete(&self, durable_path: &str) -> DeleteOutcome {
        self.record(StoreCall::Delete(durable_path.to_string()));
        let Ok(mut state) = self.state.lock() else {
            return DeleteOutcome::failed("recording store lock poisoned");
        };
        if state.fail_deletes {
            return DeleteOutcome::failed("scripted delete failure");
        }
        state.existing.remove(durable_path);
        DeleteOutcome::ok("deleted")
    }

    async fn exists(&self, durable_path: &str) -> bool {
        self.record(StoreCall::Exists(durable_path.to_string()));
        self.contains(durable_path)
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Extractor that returns queued results in order.
#[derive(Clone, Default)]
pub struct ScriptedExtractor {
    results: Arc<Mutex<VecDeque<Result<ExtractedFieldSet>>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful result.
    pub fn push_fields<I, K>(&self, fields: I, confidence: f64)
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        let fields: BTreeMap<String, JsonValue> =
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.push(Ok(ExtractedFieldSet::new(fields, confidence)));
    }

    /// Queue a failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.push(Err(Error::Extraction(message.into())));
    }

    fn push(&self, result: Result<ExtractedFieldSet>) {
        if let Ok(mut results) = self.results.lock() {
            results.push_back(result);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionService for ScriptedExtractor {
    async fn extract(
        &self,
        _document: &StagedFile,
        _schema: &FormSchema,
    ) -> Result<ExtractedFieldSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| Err(Error::Extraction("no scripted result".to_string())))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
