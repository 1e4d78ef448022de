//! arms-api - HTTP API server for ARMS form sessions

mod handlers;
mod sessions;


use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use arms_core::{defaults, FormRegistry, Notice, RecordSink, StaticOptionCatalog, StoredRecord};
use arms_db::{Database, InMemoryRecordStore, PgRecordRepository, StorageConfig};
use arms_inference::{build_extractor, ExtractionConfig};
use arms_lifecycle::{LifecycleConfig, LifecycleServices};

use crate::sessions::{SessionRegistry, SharedSession};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Where finalized records live.
#[derive(Clone)]
enum RecordStore {
    Postgres(PgRecordRepository),
    Memory(InMemoryRecordStore),
}

impl RecordStore {
    async fn get(&self, id: i64) -> arms_core::Result<StoredRecord> {
        match self {
            RecordStore::Postgres(repo) => repo.get(id).await,
            RecordStore::Memory(store) => store
                .get(id)
                .ok_or_else(|| arms_core::Error::NotFound(format!("Record {} not found", id))),
        }
    }

    fn sink(&self) -> Arc<dyn RecordSink> {
        match self {
            RecordStore::Postgres(repo) => Arc::new(repo.clone()),
            RecordStore::Memory(store) => Arc::new(store.clone()),
        }
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    forms: Arc<FormRegistry>,
    /// Collaborators; each session swaps in its own notice buffer.
    services: LifecycleServices,
    lifecycle: LifecycleConfig,
    records: RecordStore,
    sessions: SessionRegistry,
}

impl AppState {
    async fn session(&self, id: Uuid) -> Result<SharedSession, ApiError> {
        self.sessions
            .get(id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Form session {} not found", id)))
    }
}

/// Build the router with all routes and middleware.
fn app(state: AppState) -> Router {
    let body_limit = usize::try_from(state.lifecycle.max_upload_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(64 * 1024);

    Router::new()
        .route("/health", get(handlers::forms::health_check))
        .route("/api/v1/forms", get(handlers::forms::list_forms))
        .route("/api/v1/sessions", post(handlers::sessions::open_session))
        .route(
            "/api/v1/sessions/:id",
            get(handlers::sessions::get_session).delete(handlers::sessions::cancel_session),
        )
        .route(
            "/api/v1/sessions/:id/fields/:field",
            put(handlers::sessions::set_field),
        )
        .route(
            "/api/v1/sessions/:id/fields/:field/touch",
            post(handlers::sessions::touch_field),
        )
        .route(
            "/api/v1/sessions/:id/document",
            post(handlers::sessions::upload_document).delete(handlers::sessions::remove_document),
        )
        .route(
            "/api/v1/sessions/:id/extract",
            post(handlers::sessions::run_extraction),
        )
        .route("/api/v1/sessions/:id/save", post(handlers::sessions::save_session))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TraceLayer::new_for_http()),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parse_allowed_origins()))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .max_age(Duration::from_secs(3600)),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .with_state(state)
}

/// Parse allowed CORS origins from `ALLOWED_ORIGINS` (comma-separated).
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string());

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "arms_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "arms_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("arms-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SERVER_PORT);
    let session_idle_secs: u64 = std::env::var("ARMS_SESSION_IDLE_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults::SESSION_IDLE_SECS);

    // Records and options: Postgres when configured, in-memory otherwise
    let (records, catalog): (RecordStore, Arc<dyn arms_core::OptionCatalog>) =
        match std::env::var("DATABASE_URL").ok().filter(|u| !u.trim().is_empty()) {
            Some(database_url) => {
                info!("Connecting to database...");
                let db = Database::connect(&database_url).await?;
                db.migrate().await?;
                info!("Database connected");
                (
                    RecordStore::Postgres(db.records.clone()),
                    Arc::new(db.options.clone()),
                )
            }
            None => {
                warn!("DATABASE_URL not set, records are kept in memory");
                (
                    RecordStore::Memory(InMemoryRecordStore::new()),
                    Arc::new(StaticOptionCatalog::new()),
                )
            }
        };

    let storage = StorageConfig::from_env();
    let (staging, durable) = storage.build().await?;
    info!(
        backend = ?storage.backend,
        durable = durable.name(),
        "Document storage ready"
    );

    let extraction = ExtractionConfig::load()?;
    let extractor = build_extractor(&extraction, Some(catalog.clone()))?;
    info!(
        enabled = extraction.enabled,
        extractor = extractor.name(),
        "Extraction configured"
    );

    let services = LifecycleServices::new(staging, durable, extractor, catalog, records.sink());
    let sessions = SessionRegistry::new();
    sessions.spawn_sweeper(
        Duration::from_secs(session_idle_secs),
        Duration::from_secs(defaults::SESSION_SWEEP_SECS),
    );

    let state = AppState {
        forms: Arc::new(FormRegistry::builtin()),
        services,
        lifecycle: LifecycleConfig::from_env(),
        records,
        sessions,
    };

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    /// An error from the lifecycle, with notices it raised.
    Lifecycle {
        error: arms_core::Error,
        notices: Vec<Notice>,
    },
    NotFound(String),
    BadRequest(String),
}

impl ApiError {
    fn with_notices(self, notices: Vec<Notice>) -> Self {
        match self {
            ApiError::Lifecycle { error, .. } => ApiError::Lifecycle { error, notices },
            other => other,
        }
    }
}

impl From<arms_core::Error> for ApiError {
    fn from(error: arms_core::Error) -> Self {
        ApiError::Lifecycle {
            error,
            notices: Vec::new(),
        }
    }
}

/// HTTP status for a lifecycle error.
fn status_for(error: &arms_core::Error) -> StatusCode {
    use arms_core::Error;
    match error {
        Error::Upload(_) | Error::UploadValidation(_) => StatusCode::BAD_GATEWAY,
        Error::InvalidDocumentPath(_) | Error::DocumentRequired(_) | Error::Extraction(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, kind, message, notices) = match self {
            ApiError::Lifecycle { error, notices } => {
                (status_for(&error), error.kind().as_str(), error.to_string(), notices)
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, Vec::new()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_input", msg, Vec::new()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "kind": kind,
            "notices": notices,
        }));

        (status, body).into_response()
    }
}
