//! Lifecycle flow tests against in-memory collaborators.

mod extraction_flow_tests;

use std::sync::Arc;

use arms_db::{InMemoryRecordStore, MemoryStagingArea};
use chrono::NaiveDate;
use serde_json::json;

use crate::mock::{RecordingDurableStore, ScriptedExtractor};
use crate::{
    DocumentLifecycle, FieldOption, FormRegistry, FormSchema, LifecycleConfig,
    LifecycleServices, NoticeBuffer, RecordKind, RecordPayload, StagedFile, StaticOptionCatalog,
    StoredRecord,
};

pub(crate) const OWNER: i64 = 5;

/// Collaborators for one test, kept so assertions can inspect them.
pub(crate) struct Harness {
    pub staging: MemoryStagingArea,
    pub durable: RecordingDurableStore,
    pub extractor: ScriptedExtractor,
    pub records: InMemoryRecordStore,
    pub notices: NoticeBuffer,
    pub catalog: StaticOptionCatalog,
    pub config: LifecycleConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_durable(RecordingDurableStore::new())
    }

    pub fn with_durable(durable: RecordingDurableStore) -> Self {
        let catalog = StaticOptionCatalog::new()
            .with_options(
                "level",
                vec![
                    FieldOption::new(1, "International"),
                    FieldOption::new(2, "National"),
                    FieldOption::new(3, "State"),
                ],
            )
            .with_options(
                "event_type",
                vec![
                    FieldOption::new(10, "Workshop"),
                    FieldOption::new(11, "Conference"),
                ],
            );
        Self {
            staging: MemoryStagingArea::new(),
            durable,
            extractor: ScriptedExtractor::new(),
            records: InMemoryRecordStore::new(),
            notices: NoticeBuffer::new(),
            catalog,
            config: LifecycleConfig::default(),
        }
    }

    pub fn services(&self) -> LifecycleServices {
        LifecycleServices::new(
            Arc::new(self.staging.clone()),
            Arc::new(self.durable.clone()),
            Arc::new(self.extractor.clone()),
            Arc::new(self.catalog.clone()),
            Arc::new(self.records.clone()),
        )
        .with_notifier(Arc::new(self.notices.clone()))
    }

    /// Open an add-flow session for the events form.
    pub fn add(&self) -> DocumentLifecycle {
        DocumentLifecycle::open_add(self.services(), self.config.clone(), events(), OWNER)
            .with_today(today())
    }

    /// Open an edit-flow session on a stored record.
    pub fn edit(&self, record: StoredRecord) -> DocumentLifecycle {
        DocumentLifecycle::open_edit(self.services(), self.config.clone(), events(), record)
            .unwrap()
            .with_today(today())
    }

    /// Seed an event record carrying `document` in its document field.
    pub fn seed_event(&self, document: Option<&str>) -> StoredRecord {
        let mut payload = RecordPayload::new();
        payload.insert("title".into(), json!("Existing event"));
        payload.insert("venue".into(), json!("Main hall"));
        payload.insert("Image".into(), json!(document));
        self.records.seed(RecordKind::Event, OWNER, payload)
    }
}

pub(crate) fn events() -> FormSchema {
    FormRegistry::builtin().get("events").unwrap().clone()
}

pub(crate) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

pub(crate) fn pdf(name: &str) -> StagedFile {
    StagedFile::new(name, "application/pdf", b"%PDF-1.7 brochure".to_vec())
}
