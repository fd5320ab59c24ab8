//! Axum handlers.
//!
//! Each handler receives [`AppState`] via [`axum::extract::State`] and
//! returns an axum [`Response`]. Errors are JSON bodies of the shape
//! `{"error": code, "message": text}`.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use super::AppState;
use crate::subsystems::generation::metrics::content_type as metrics_content_type;
use crate::subsystems::generation::remote::API_KEY_HEADER;
use crate::subsystems::generation::{GenerationError, GenerationRequest, Generator};
use crate::subsystems::knowledge::{KnowledgeLookup, KnowledgeQuery, KnowledgeResult};
use crate::subsystems::nlu::{AnalyzeRequest, AnalyzeResponse, IntentClassifier};
use crate::subsystems::orchestrator::PipelineRequest;

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build a JSON error response body.
fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn api_key_matches(state: &AppState, headers: &HeaderMap) -> bool {
    let presented = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    match (state.service_api_key.as_deref(), presented) {
        (Some(expected), Some(presented)) => expected == presented,
        _ => false,
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /health
pub(super) async fn health(State(state): State<AppState>) -> Response {
    let breaker = state.pipeline.generator().breaker_snapshot();
    Json(json!({
        "status": "ok",
        "service": &*state.service_name,
        "breaker": breaker,
    }))
    .into_response()
}

/// GET /metrics — Prometheus text format. 404 when generation is remote.
pub(super) async fn metrics(State(state): State<AppState>) -> Response {
    let Some(m) = state.pipeline.generator().metrics() else {
        return (StatusCode::NOT_FOUND, json_error("not_found", "generation metrics live in the remote service"))
            .into_response();
    };
    match m.export() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, metrics_content_type())], body).into_response(),
        Err(e) => {
            error!("metrics export failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", e)).into_response()
        }
    }
}

/// POST /chat
///
/// The pipeline runs on its own task so a client disconnect does not cancel
/// logging of stages that already completed.
pub(super) async fn chat(State(state): State<AppState>, Json(req): Json<PipelineRequest>) -> Response {
    let pipeline = state.pipeline.clone();
    match tokio::spawn(async move { pipeline.handle(req).await }).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => {
            error!("chat pipeline task failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", "chat pipeline failed")).into_response()
        }
    }
}

/// GET /api/chat/session
pub(super) async fn sessions(State(state): State<AppState>) -> Response {
    match state.pipeline.sink().list_sessions().await {
        Ok(sessions) => (StatusCode::OK, Json(sessions)).into_response(),
        Err(e) => {
            warn!("sessions request failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", e)).into_response()
        }
    }
}

/// GET /api/chat/history/{session_id}
pub(super) async fn history(State(state): State<AppState>, Path(session_id): Path<String>) -> Response {
    match state.pipeline.sink().history(&session_id).await {
        Ok(Some(turns)) => (StatusCode::OK, Json(json!({ "session_id": session_id, "history": turns }))).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, json_error("not_found", "Session ID not found")).into_response(),
        Err(e) => {
            warn!(%session_id, "history request failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, json_error("internal", e)).into_response()
        }
    }
}

/// POST /analyze
pub(super) async fn analyze(State(state): State<AppState>, Json(req): Json<AnalyzeRequest>) -> Response {
    match state.pipeline.classifier().classify(&req.message).await {
        Ok(result) => (StatusCode::OK, Json(AnalyzeResponse::from(&result))).into_response(),
        Err(e) => {
            warn!("classifier request failed: {e}");
            (StatusCode::BAD_GATEWAY, json_error("classifier", e)).into_response()
        }
    }
}

/// POST /query — store errors degrade to the `generic` sentinel.
pub(super) async fn query(State(state): State<AppState>, Json(req): Json<KnowledgeQuery>) -> Response {
    let result = state.pipeline.knowledge().lookup(&req).await.unwrap_or_else(|e| {
        warn!("knowledge request failed: {e}");
        KnowledgeResult::generic()
    });
    (StatusCode::OK, Json(result)).into_response()
}

/// POST /generate
pub(super) async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerationRequest>,
) -> Response {
    if !api_key_matches(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, json_error("unauthorized", "Unauthorized")).into_response();
    }

    match state.pipeline.generator().generate(&req).await {
        Ok(output) => (StatusCode::OK, Json(output)).into_response(),
        Err(GenerationError::BreakerOpen) => (
            StatusCode::SERVICE_UNAVAILABLE,
            json_error("breaker_open", "LLM temporarily unavailable, please try again shortly"),
        )
            .into_response(),
        Err(GenerationError::Unauthorized) => {
            warn!("downstream generator rejected the service key");
            (StatusCode::BAD_GATEWAY, json_error("upstream_unauthorized", GenerationError::Unauthorized))
                .into_response()
        }
        Err(e) => (StatusCode::BAD_GATEWAY, json_error("generation_failed", e)).into_response(),
    }
}
