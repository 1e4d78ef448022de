//! Form session handlers.
//!
//! Every response carries the session view and drains the notices the
//! session raised since the previous response.

use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use arms_core::{ReconcileMode, RecordPayload, SaveOptions, StagedFile};
use arms_lifecycle::{DocumentLifecycle, NoticeBuffer};

use crate::sessions::SessionEntry;
use crate::{ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct OpenSessionRequest {
    pub form_type: String,
    pub owner_id: i64,
    /// Existing record to edit. Omit to add a new record.
    #[serde(default)]
    pub record_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetFieldRequest {
    pub value: JsonValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExtractRequest {
    #[serde(default)]
    pub mode: ReconcileMode,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub document_required: bool,
    /// Payload to save instead of the session draft.
    #[serde(default)]
    pub payload: Option<RecordPayload>,
}

/// Open a form session in add or edit mode.
pub async fn open_session(
    State(state): State<AppState>,
    Json(req): Json<OpenSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let schema = state.forms.get(&req.form_type)?.clone();
    let notices = NoticeBuffer::new();
    let services = state
        .services
        .clone()
        .with_notifier(Arc::new(notices.clone()));

    let lifecycle = match req.record_id {
        None => DocumentLifecycle::open_add(
            services,
            state.lifecycle.clone(),
            schema,
            req.owner_id,
        ),
        Some(record_id) => {
            let record = state.records.get(record_id).await?;
            if record.owner_id != req.owner_id {
                return Err(ApiError::NotFound(format!(
                    "Record {} not found for owner {}",
                    record_id, req.owner_id
                )));
            }
            DocumentLifecycle::open_edit(services, state.lifecycle.clone(), schema, record)?
        }
    };

    let view = lifecycle.state();
    let entry = SessionEntry::new(lifecycle, notices);
    let pending = entry.drain_notices();
    state.sessions.insert(entry).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "session": view, "notices": pending })),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JsonValue>, ApiError> {
    let session = state.session(id).await?;
    let entry = session.lock().await;
    Ok(Json(json!({
        "session": entry.lifecycle.state(),
        "notices": entry.drain_notices(),
    })))
}

/// User edit of one field.
pub async fn set_field(
    State(state): State<AppState>,
    Path((id, field)): Path<(Uuid, String)>,
    Json(req): Json<SetFieldRequest>,
) -> Result<Json<JsonValue>, ApiError> {
    let session = state.session(id).await?;
    let mut entry = session.lock().await;
    entry.lifecycle.set_field(&field, req.value)?;
    Ok(Json(json!({
        "session": entry.lifecycle.state(),
        "notices": entry.drain_notices(),
    })))
}

/// The user touched a field; drops its auto-fill highlight.
pub async fn touch_field(
    State(state): State<AppState>,
    Path((id, field)): Path<(Uuid, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let session = state.session(id).await?;
    let mut entry = session.lock().await;
    let cleared = entry.lifecycle.touch(&field);
    Ok(Json(json!({
        "cleared": cleared,
        "session": entry.lifecycle.state(),
        "notices": entry.drain_notices(),
    })))
}

/// Stage a selected file.
///
/// # Multipart Fields
/// - `file`: the document (required)
pub async fn upload_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<JsonValue>, ApiError> {
    let mut file: Option<StagedFile> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("document").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?
            .to_vec();
        file = Some(StagedFile::new(filename, content_type, data));
        break;
    }
    let file =
        file.ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".to_string()))?;

    let session = state.session(id).await?;
    let mut entry = session.lock().await;
    let document = match entry.lifecycle.on_file_selected(file).await {
        Ok(document) => document,
        Err(e) => return Err(ApiError::from(e).with_notices(entry.drain_notices())),
    };
    Ok(Json(json!({
        "document": document,
        "session": entry.lifecycle.state(),
        "notices": entry.drain_notices(),
    })))
}

/// Unbind the document from the form.
pub async fn remove_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JsonValue>, ApiError> {
    let session = state.session(id).await?;
    let mut entry = session.lock().await;
    entry.lifecycle.remove_document()?;
    Ok(Json(json!({
        "session": entry.lifecycle.state(),
        "notices": entry.drain_notices(),
    })))
}

/// Run extraction on the staged document and reconcile the result.
///
/// The session is not locked while the extraction call runs, so a cancel
/// issued meanwhile wins and the late result is discarded.
pub async fn run_extraction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Option<Json<ExtractRequest>>,
) -> Result<Json<JsonValue>, ApiError> {
    let mode = req.map(|Json(r)| r.mode).unwrap_or_default();
    let session = state.session(id).await?;

    let ticket = {
        let entry = session.lock().await;
        match entry.lifecycle.begin_extraction().await {
            Ok(ticket) => ticket,
            Err(e) => return Err(ApiError::from(e).with_notices(entry.drain_notices())),
        }
    };
    let result = ticket.run().await;

    let mut entry = session.lock().await;
    let report = match entry.lifecycle.apply_extraction(ticket, result, mode).await {
        Ok(report) => report,
        Err(e) => return Err(ApiError::from(e).with_notices(entry.drain_notices())),
    };
    Ok(Json(json!({
        "applied": report.is_some(),
        "report": report,
        "session": entry.lifecycle.state(),
        "notices": entry.drain_notices(),
    })))
}

/// Save the record, promoting a staged document first.
pub async fn save_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Option<Json<SaveRequest>>,
) -> Result<Json<JsonValue>, ApiError> {
    let req = req.map(|Json(r)| r).unwrap_or_default();
    let options = SaveOptions {
        document_required: req.document_required,
    };
    let session = state.session(id).await?;
    let mut entry = session.lock().await;

    let result = match req.payload {
        Some(payload) => entry.lifecycle.save_record(payload, options).await,
        None => entry.lifecycle.save(options).await,
    };
    let saved = match result {
        Ok(saved) => saved,
        Err(e) => return Err(ApiError::from(e).with_notices(entry.drain_notices())),
    };
    Ok(Json(json!({
        "saved": saved,
        "session": entry.lifecycle.state(),
        "notices": entry.drain_notices(),
    })))
}

/// Cancel the form and drop the session. Issues no store calls.
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JsonValue>, ApiError> {
    let session = state
        .sessions
        .remove(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Form session {} not found", id)))?;
    let mut entry = session.lock().await;
    entry.lifecycle.cancel();
    Ok(Json(json!({
        "cancelled": true,
        "session": entry.lifecycle.state(),
        "notices": entry.drain_notices(),
    })))
}
