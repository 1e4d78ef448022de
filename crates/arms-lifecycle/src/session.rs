//! Per-record editing state.

use serde::Serialize;
use serde_json::Value as JsonValue;

use arms_core::{AutoFilledFieldSet, RecordPayload};

/// Original snapshot, current draft, dirty flag and auto-filled set of one
/// open form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormSession {
    original: RecordPayload,
    draft: RecordPayload,
    dirty: bool,
    auto_filled: AutoFilledFieldSet,
}

impl FormSession {
    /// Session for a form opened on `original` (empty in add mode).
    pub fn new(original: RecordPayload) -> Self {
        Self {
            draft: original.clone(),
            original,
            dirty: false,
            auto_filled: AutoFilledFieldSet::new(),
        }
    }

    pub fn original(&self) -> &RecordPayload {
        &self.original
    }

    pub fn draft(&self) -> &RecordPayload {
        &self.draft
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.draft.get(field)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn auto_filled(&self) -> &AutoFilledFieldSet {
        &self.auto_filled
    }

    /// User edit. Drops the field's machine-filled highlight.
    pub fn set_field(&mut self, field: &str, value: JsonValue) {
        self.auto_filled.remove(field);
        self.draft.insert(field.to_string(), value);
        self.dirty = true;
    }

    /// User touched a field (blur/focus) without necessarily changing it.
    pub fn touch(&mut self, field: &str) -> bool {
        self.auto_filled.remove(field)
    }

    pub fn is_auto_filled(&self, field: &str) -> bool {
        self.auto_filled.contains(field)
    }

    /// Mutable access for a reconciliation pass.
    pub(crate) fn reconcile_targets(&mut self) -> (&mut RecordPayload, &mut AutoFilledFieldSet) {
        self.dirty = true;
        (&mut self.draft, &mut self.auto_filled)
    }

    /// Discard the draft and all highlighting.
    pub fn reset(&mut self) {
        self.draft = self.original.clone();
        self.auto_filled.clear();
        self.dirty = false;
    }

    /// Adopt a saved payload as the new snapshot.
    pub fn commit(&mut self, saved: RecordPayload) {
        self.original = saved.clone();
        self.draft = saved;
        self.auto_filled.clear();
        self.dirty = false;
    }
}
