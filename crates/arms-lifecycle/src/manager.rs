//! Document lifecycle manager.
//!
//! One [`DocumentLifecycle`] drives one open form: a file is staged on
//! selection, optionally run through extraction, and only promoted to the
//! durable store when the record is saved. Cancel never touches a store.
//!
//! Within a save the order of store calls is fixed: `put` for the new
//! document, then the backend write, then `exists`/`delete` for the
//! superseded one. A failed `put` or an unusable returned path aborts the
//! save before anything is written.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};
use uuid::Uuid;

use arms_core::{
    detect_content_type, new_v7, temporary_key, validate_durable_path, validate_upload,
    DocumentRef, DocumentState, DurableStore, Error, ExtractedFieldSet, ExtractionService,
    FieldOption, FinalizedRecord, FormSchema, Notice, Notifier, OptionCatalog, ReconcileMode,
    RecordPayload, RecordSink, Result, SaveOptions, StagedFile, StagingStore, StoredRecord,
    UploadIntent,
};

use crate::config::LifecycleConfig;
use crate::notify::TracingNotifier;
use crate::reconciler::{FieldReconciler, ReconcileReport};
use crate::session::FormSession;

/// External collaborators shared by every lifecycle session.
#[derive(Clone)]
pub struct LifecycleServices {
    pub staging: Arc<dyn StagingStore>,
    pub durable: Arc<dyn DurableStore>,
    pub extractor: Arc<dyn ExtractionService>,
    pub catalog: Arc<dyn OptionCatalog>,
    pub records: Arc<dyn RecordSink>,
    pub notifier: Arc<dyn Notifier>,
}

impl LifecycleServices {
    /// Services that report notices to the log.
    pub fn new(
        staging: Arc<dyn StagingStore>,
        durable: Arc<dyn DurableStore>,
        extractor: Arc<dyn ExtractionService>,
        catalog: Arc<dyn OptionCatalog>,
        records: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            staging,
            durable,
            extractor,
            catalog,
            records,
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// A staged document captured for one extraction call.
///
/// Holds no reference to the session, so the call can run while the
/// session keeps accepting input. The result is applied with
/// [`DocumentLifecycle::apply_extraction`], which drops it when the session
/// moved on in the meantime.
pub struct ExtractionTicket {
    epoch: u64,
    document: StagedFile,
    schema: FormSchema,
    extractor: Arc<dyn ExtractionService>,
}

impl ExtractionTicket {
    pub fn document(&self) -> &StagedFile {
        &self.document
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Run the extraction call.
    pub async fn run(&self) -> Result<ExtractedFieldSet> {
        self.extractor.extract(&self.document, &self.schema).await
    }
}

/// Serializable view of a lifecycle session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub form_type: String,
    pub owner_id: i64,
    pub record_id: Option<i64>,
    pub document_state: DocumentState,
    pub document: DocumentRef,
    pub original_document: DocumentRef,
    pub draft: RecordPayload,
    pub auto_filled: Vec<String>,
    pub dirty: bool,
    pub closed: bool,
}

/// Document lifecycle of one open form.
pub struct DocumentLifecycle {
    id: Uuid,
    services: LifecycleServices,
    config: LifecycleConfig,
    schema: FormSchema,
    intent: UploadIntent,
    session: FormSession,
    /// Key used for placement until the record has an id. Stable across retries.
    temporary_id: String,
    /// Bumped whenever an in-flight extraction result must be discarded.
    epoch: u64,
    closed: bool,
    today: Option<NaiveDate>,
}

impl DocumentLifecycle {
    /// Open a form for a new record.
    pub fn open_add(
        services: LifecycleServices,
        config: LifecycleConfig,
        schema: FormSchema,
        owner_id: i64,
    ) -> Self {
        let intent = UploadIntent::for_add(owner_id, schema.category());
        Self::with_intent(services, config, schema, intent, RecordPayload::new())
    }

    /// Open a form on an existing record.
    pub fn open_edit(
        services: LifecycleServices,
        config: LifecycleConfig,
        schema: FormSchema,
        record: StoredRecord,
    ) -> Result<Self> {
        if record.kind != schema.kind {
            return Err(Error::InvalidInput(format!(
                "Record {} is a {}, form '{}' edits {}",
                record.id, record.kind, schema.form_type, schema.kind
            )));
        }
        let original = DocumentRef::from_value(record.payload.get(&schema.document_field));
        let intent =
            UploadIntent::for_edit(record.owner_id, record.id, schema.category(), original);
        Ok(Self::with_intent(
            services,
            config,
            schema,
            intent,
            record.payload,
        ))
    }

    fn with_intent(
        services: LifecycleServices,
        config: LifecycleConfig,
        schema: FormSchema,
        intent: UploadIntent,
        payload: RecordPayload,
    ) -> Self {
        let id = new_v7();
        info!(
            subsystem = "lifecycle",
            op = "open",
            session_id = %id,
            form_type = %schema.form_type,
            owner_id = intent.owner_id,
            record_id = ?intent.record_id,
            document_path = %intent.original,
            "Form session opened"
        );
        Self {
            id,
            services,
            config,
            schema,
            intent,
            session: FormSession::new(payload),
            temporary_id: temporary_key(),
            epoch: 0,
            closed: false,
            today: None,
        }
    }

    /// Pin the date used to reject future dates during reconciliation.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn intent(&self) -> &UploadIntent {
        &self.intent
    }

    pub fn session(&self) -> &FormSession {
        &self.session
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn document_state(&self) -> DocumentState {
        DocumentState::from(&self.intent.current)
    }

    pub fn state(&self) -> SessionView {
        SessionView {
            id: self.id,
            form_type: self.schema.form_type.clone(),
            owner_id: self.intent.owner_id,
            record_id: self.intent.record_id,
            document_state: self.document_state(),
            document: self.intent.current.clone(),
            original_document: self.intent.original.clone(),
            draft: self.session.draft().clone(),
            auto_filled: self
                .session
                .auto_filled()
                .iter()
                .map(str::to_string)
                .collect(),
            dirty: self.session.is_dirty(),
            closed: self.closed,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidInput(format!(
                "Form session {} is closed",
                self.id
            )));
        }
        Ok(())
    }

    fn notify(&self, notice: Notice) {
        self.services.notifier.notify(notice);
    }

    /// Bind a new document reference and invalidate pending extraction.
    fn bind_document(&mut self, document: DocumentRef) {
        self.session
            .set_field(&self.schema.document_field, document.to_value());
        self.intent.current = document;
        self.epoch += 1;
    }

    // =========================================================================
    // DOCUMENT SELECTION
    // =========================================================================

    /// Stage a file the user selected.
    ///
    /// Rejected files leave the bound document unchanged.
    pub async fn on_file_selected(&mut self, mut file: StagedFile) -> Result<DocumentRef> {
        self.ensure_open()?;
        validate_upload(&file.filename, &file.data, self.config.max_upload_bytes)?;
        file.content_type = detect_content_type(&file.filename, &file.data, &file.content_type);

        let size = file.size();
        let staged = self.services.staging.stage(file).await?;
        info!(
            subsystem = "lifecycle",
            op = "select_file",
            session_id = %self.id,
            document_path = %staged,
            size_bytes = size,
            "Document staged"
        );
        self.bind_document(staged.clone());
        Ok(staged)
    }

    /// Bind a raw path, classified by prefix.
    pub fn attach_document_path(&mut self, path: &str) -> Result<DocumentRef> {
        self.ensure_open()?;
        let document = DocumentRef::classify(Some(path));
        debug!(
            subsystem = "lifecycle",
            session_id = %self.id,
            document_path = %document,
            "Document path attached"
        );
        self.bind_document(document.clone());
        Ok(document)
    }

    /// Unbind the document. A superseded durable original is removed on save.
    pub fn remove_document(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.bind_document(DocumentRef::None);
        Ok(())
    }

    // =========================================================================
    // FIELD EDITS
    // =========================================================================

    /// User edit of one field. Edits of the document field rebind the document.
    pub fn set_field(&mut self, field: &str, value: JsonValue) -> Result<()> {
        self.ensure_open()?;
        if field == self.schema.document_field {
            let document = match &value {
                JsonValue::String(s) => DocumentRef::classify(Some(s)),
                other => DocumentRef::from_value(Some(other)),
            };
            self.bind_document(document);
            return Ok(());
        }
        self.session.set_field(field, value);
        Ok(())
    }

    /// The user touched a field. Returns whether a highlight was cleared.
    pub fn touch(&mut self, field: &str) -> bool {
        self.session.touch(field)
    }

    pub fn is_auto_filled(&self, field: &str) -> bool {
        self.session.is_auto_filled(field)
    }

    pub fn clear_auto_fill_highlight(&mut self, field: &str) {
        self.session.touch(field);
    }

    // =========================================================================
    // EXTRACTION
    // =========================================================================

    fn reconciler(&self) -> FieldReconciler {
        match self.today {
            Some(today) => FieldReconciler::new(today),
            None => FieldReconciler::today(),
        }
    }

    /// Capture the staged document for an extraction call.
    ///
    /// Fails with a non-fatal extraction error when no new document is
    /// staged or it can no longer be read.
    pub async fn begin_extraction(&self) -> Result<ExtractionTicket> {
        self.ensure_open()?;
        let document = match &self.intent.current {
            DocumentRef::Staged(path) => self.services.staging.read(path).await,
            _ => Err(Error::InvalidInput(
                "Select a new document before running extraction".to_string(),
            )),
        };
        match document {
            Ok(document) => Ok(ExtractionTicket {
                epoch: self.epoch,
                document,
                schema: self.schema.clone(),
                extractor: self.services.extractor.clone(),
            }),
            Err(e) => Err(self.extraction_failed(e)),
        }
    }

    /// Apply the result of a ticket's extraction call.
    ///
    /// Returns `Ok(None)` when the session was closed, saved, or bound to a
    /// different document since the ticket was issued. Failures and
    /// low-confidence results are reported as non-fatal extraction errors
    /// and leave the form untouched.
    pub async fn apply_extraction(
        &mut self,
        ticket: ExtractionTicket,
        result: Result<ExtractedFieldSet>,
        mode: ReconcileMode,
    ) -> Result<Option<ReconcileReport>> {
        if self.closed || ticket.epoch != self.epoch {
            debug!(
                subsystem = "lifecycle",
                op = "extract",
                session_id = %self.id,
                ticket_epoch = ticket.epoch,
                epoch = self.epoch,
                "Discarding stale extraction result"
            );
            return Ok(None);
        }

        let extracted = match result {
            Ok(extracted) if extracted.confidence < self.config.min_confidence => {
                return Err(self.extraction_failed(Error::Extraction(format!(
                    "confidence {:.2} is below the {:.2} threshold",
                    extracted.confidence, self.config.min_confidence
                ))));
            }
            Ok(extracted) => extracted,
            Err(e) => return Err(self.extraction_failed(e)),
        };

        let options = self.load_options().await;
        let reconciler = self.reconciler();
        let (draft, auto_filled) = self.session.reconcile_targets();
        let report = reconciler.reconcile(&self.schema, extracted, &options, draft, auto_filled, mode);

        info!(
            subsystem = "lifecycle",
            op = "extract",
            session_id = %self.id,
            form_type = %self.schema.form_type,
            field_count = report.updated.len(),
            cleared = report.cleared.len(),
            skipped = report.skipped.len(),
            confidence = report.confidence,
            "Extraction reconciled"
        );
        self.notify(Notice::transient(report.summary()));
        Ok(Some(report))
    }

    /// Extract from the staged document and reconcile in one step.
    pub async fn run_extraction(&mut self, mode: ReconcileMode) -> Result<Option<ReconcileReport>> {
        let ticket = self.begin_extraction().await?;
        let result = ticket.run().await;
        self.apply_extraction(ticket, result, mode).await
    }

    fn extraction_failed(&self, e: Error) -> Error {
        let e = match e {
            Error::Extraction(_) => e,
            other => Error::Extraction(other.to_string()),
        };
        warn!(
            subsystem = "lifecycle",
            op = "extract",
            session_id = %self.id,
            form_type = %self.schema.form_type,
            error = %e,
            "Extraction failed"
        );
        self.notify(Notice::for_error(&e));
        e
    }

    async fn load_options(&self) -> BTreeMap<String, Vec<FieldOption>> {
        let mut options = BTreeMap::new();
        for key in self.schema.catalog_keys() {
            let list = match self.services.catalog.options(key).await {
                Ok(list) => list,
                Err(e) => {
                    // No options means no enum value can be accepted.
                    warn!(subsystem = "lifecycle", catalog = key, error = %e, "Option lookup failed");
                    Vec::new()
                }
            };
            options.insert(key.to_string(), list);
        }
        options
    }

    // =========================================================================
    // SAVE / CANCEL
    // =========================================================================

    /// Save the current draft.
    pub async fn save(&mut self, options: SaveOptions) -> Result<FinalizedRecord> {
        let payload = self.session.draft().clone();
        self.save_record(payload, options).await
    }

    /// Save `payload` with the document resolved from the session.
    ///
    /// Any error is fatal: nothing was written to the backend unless the
    /// error came from the backend write itself.
    pub async fn save_record(
        &mut self,
        payload: RecordPayload,
        options: SaveOptions,
    ) -> Result<FinalizedRecord> {
        self.ensure_open()?;
        let start = Instant::now();
        match self.finalize(payload, options).await {
            Ok(finalized) => {
                info!(
                    subsystem = "lifecycle",
                    op = "save",
                    session_id = %self.id,
                    form_type = %self.schema.form_type,
                    record_id = finalized.record.id,
                    document_path = %finalized.document,
                    cleanup_ok = finalized.cleanup_ok,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Record saved"
                );
                self.notify(Notice::transient("Record saved"));
                Ok(finalized)
            }
            Err(e) => {
                warn!(
                    subsystem = "lifecycle",
                    op = "save",
                    session_id = %self.id,
                    form_type = %self.schema.form_type,
                    error_kind = %e.kind(),
                    error = %e,
                    "Save aborted"
                );
                self.notify(Notice::for_error(&e));
                Err(e)
            }
        }
    }

    async fn finalize(
        &mut self,
        mut payload: RecordPayload,
        options: SaveOptions,
    ) -> Result<FinalizedRecord> {
        let resolved = self.resolve_document().await?;

        if options.document_required && resolved.path().is_none() {
            return Err(Error::DocumentRequired(self.schema.form_type.clone()));
        }

        let superseded = match &self.intent.original {
            DocumentRef::Durable(old) if resolved.path() != Some(old.as_str()) => {
                Some(old.clone())
            }
            _ => None,
        };

        payload.insert(self.schema.document_field.clone(), resolved.to_value());
        let record = self
            .services
            .records
            .write(
                self.schema.kind,
                self.intent.owner_id,
                self.intent.record_id,
                payload,
            )
            .await?;

        let cleanup_ok = match &superseded {
            Some(path) => self.cleanup(path).await,
            None => true,
        };

        self.intent = UploadIntent::for_edit(
            record.owner_id,
            record.id,
            self.intent.category.clone(),
            resolved.clone(),
        );
        self.session.commit(record.payload.clone());
        self.epoch += 1;

        Ok(FinalizedRecord {
            record,
            document: resolved,
            superseded,
            cleanup_ok,
        })
    }

    /// Resolve the bound document to the reference the record will carry.
    async fn resolve_document(&mut self) -> Result<DocumentRef> {
        if !self.intent.changed() {
            debug!(
                subsystem = "lifecycle",
                session_id = %self.id,
                document_path = %self.intent.original,
                "Document unchanged, passing through"
            );
            if !self.intent.original.is_persistable() {
                return Err(Error::InvalidDocumentPath(self.intent.original.to_string()));
            }
            return Ok(self.intent.original.clone());
        }

        match self.intent.current.clone() {
            DocumentRef::Staged(staged_path) => {
                let durable = self.promote(&staged_path).await?;
                // A later failure retries from here without uploading again.
                self.intent.current = durable.clone();
                self.session
                    .set_field(&self.schema.document_field, durable.to_value());
                Ok(durable)
            }
            DocumentRef::Durable(path) => Ok(DocumentRef::Durable(path)),
            DocumentRef::None => Ok(DocumentRef::None),
            other @ (DocumentRef::External(_) | DocumentRef::Unrecognized(_)) => {
                Err(Error::InvalidDocumentPath(other.to_string()))
            }
        }
    }

    async fn promote(&self, staged_path: &str) -> Result<DocumentRef> {
        let placement = self.intent.placement(&self.temporary_id);
        let path = self
            .services
            .durable
            .put(staged_path, &placement)
            .await
            .map_err(|e| match e {
                Error::Upload(_) => e,
                other => Error::Upload(other.to_string()),
            })?;
        validate_durable_path(&path, &self.config.sentinel_markers)?;

        info!(
            subsystem = "lifecycle",
            op = "promote",
            session_id = %self.id,
            owner_id = placement.owner_id,
            category = %placement.category,
            document_path = %path,
            "Document promoted"
        );
        Ok(DocumentRef::Durable(path))
    }

    /// Best-effort removal of a superseded durable document.
    async fn cleanup(&self, path: &str) -> bool {
        let durable = &self.services.durable;
        if self.config.check_exists_before_delete && !durable.exists(path).await {
            debug!(
                subsystem = "lifecycle",
                op = "cleanup",
                session_id = %self.id,
                document_path = %path,
                "Superseded document already absent, skipping delete"
            );
            return true;
        }

        let outcome = durable.delete(path).await;
        if outcome.success {
            info!(
                subsystem = "lifecycle",
                op = "cleanup",
                session_id = %self.id,
                document_path = %path,
                "Superseded document deleted"
            );
        } else {
            warn!(
                subsystem = "lifecycle",
                op = "cleanup",
                session_id = %self.id,
                document_path = %path,
                error = %outcome.message,
                "Superseded document could not be deleted"
            );
            self.notify(Notice::transient(format!(
                "Previous document could not be removed: {}",
                outcome.message
            )));
        }
        outcome.success
    }

    /// Close the form without saving. Issues no store calls.
    pub fn cancel(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.intent.current = self.intent.original.clone();
        self.session.reset();
        self.epoch += 1;
        info!(
            subsystem = "lifecycle",
            op = "cancel",
            session_id = %self.id,
            form_type = %self.schema.form_type,
            "Form session cancelled"
        );
    }
}
