//! Axum HTTP surface — the chat API plus each stage's own endpoint.
//!
//! ## URL layout
//!
//! ```text
//! GET  /health
//! GET  /metrics                       Prometheus text, generation counters
//! POST /chat                          full pipeline
//! GET  /api/chat/session              sessions, most recent first
//! GET  /api/chat/history/{session_id} turns of one session, or 404
//! POST /analyze                       classifier stage only
//! POST /query                         knowledge stage only
//! POST /generate                      generation stage only, `x-api-key` required
//! ```
//!
//! `serve` wires the [`CancellationToken`] to axum's graceful shutdown.

mod api;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::AppError;
use crate::subsystems::orchestrator::Pipeline;

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone — all fields are reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
    pub pipeline: Arc<Pipeline>,
    /// Shared secret for `/generate`; `None` rejects every call.
    pub service_api_key: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service_name: &str, pipeline: Pipeline, service_api_key: Option<String>) -> Self {
        Self {
            service_name: Arc::from(service_name),
            pipeline: Arc::new(pipeline),
            service_api_key: service_api_key.map(Arc::from),
        }
    }
}

// ── Server loop ───────────────────────────────────────────────────────────────

pub async fn serve(bind_addr: &str, state: AppState, shutdown: CancellationToken) -> Result<(), AppError> {
    let router = build_router(state);

    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Http(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "http surface listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Http(format!("axum server error: {e}")))?;

    info!("http surface shut down");
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health",                        get(api::health))
        .route("/metrics",                       get(api::metrics))
        .route("/chat",                          post(api::chat))
        .route("/api/chat/session",              get(api::sessions))
        .route("/api/chat/history/{session_id}", get(api::history))
        .route("/analyze",                       post(api::analyze))
        .route("/query",                         post(api::query))
        .route("/generate",                      post(api::generate))
        .with_state(state)
}
