//! Health and form schema handlers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tracing::warn;

use crate::AppState;

/// Service health. An unreachable extractor degrades the service but forms
/// stay usable manually.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let extractor = &state.services.extractor;
    let extraction_healthy = match extractor.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            warn!(subsystem = "api", extractor = extractor.name(), error = %e, "Extractor health check failed");
            false
        }
    };

    Json(serde_json::json!({
        "status": if extraction_healthy { "healthy" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "storage": state.services.durable.name(),
        "extraction": extractor.name(),
        "extraction_healthy": extraction_healthy,
        "sessions": state.sessions.len().await,
    }))
}

/// List the registered form schemas.
pub async fn list_forms(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "forms": state.forms.list(),
    }))
}
