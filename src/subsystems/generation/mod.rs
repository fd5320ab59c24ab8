//! Generation stage — breaker-guarded, retrying model call with a weak-answer gate.
//!
//! ```text
//! GenerationService::generate(request)
//!   ├─ breaker.allow()?            no  → Err(BreakerOpen), no outbound call
//!   ├─ prompt::build_prompt        metrics: llm_requests_total += 1
//!   ├─ client.generate             retries transient failures with backoff
//!   ├─ weak::is_weak(answer)?      yes → Err(WeakAnswer)
//!   └─ breaker.record(ok)          metrics: llm_request_latency_seconds
//! ```
//!
//! The orchestrator sees this through the [`Generator`] trait; [`Generation`]
//! picks the in-process service or the HTTP `/generate` collaborator.

pub mod breaker;
pub mod client;
pub mod metrics;
pub mod prompt;
pub mod remote;
pub mod weak;

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::error::AppError;
use crate::llm::{LlmProvider, ProviderError};
use crate::subsystems::nlu::{Entities, Intent};

pub use breaker::{BreakerSnapshot, CircuitBreaker};
pub use client::{ChatCompletion, GenerationClient, RetryPolicy};
pub use metrics::GenerationMetrics;
pub use prompt::PromptLimits;
pub use remote::RemoteGenerator;
pub use weak::{WeakResponseDetector, is_weak};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model transport failure: {0}")]
    Transport(String),
    #[error("model call timed out")]
    Timeout,
    #[error("model returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed model response: {0}")]
    Malformed(String),
    #[error("model answer too weak to serve")]
    WeakAnswer,
    #[error("generation temporarily unavailable (breaker open)")]
    BreakerOpen,
    #[error("unauthorized")]
    Unauthorized,
}

impl GenerationError {
    /// Transport, timeout and 5xx are worth another attempt; nothing else is.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Transport(_) | GenerationError::Timeout => true,
            GenerationError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<ProviderError> for GenerationError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Timeout => GenerationError::Timeout,
            ProviderError::Status { status, message } => GenerationError::Status { status, message },
            ProviderError::Malformed(m) => GenerationError::Malformed(m),
            ProviderError::Transport(m) | ProviderError::Client(m) => GenerationError::Transport(m),
            ProviderError::UnknownProvider(p) => GenerationError::Transport(format!("unknown provider: {p}")),
        }
    }
}

// ── Wire types (`POST /generate`) ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub user_message: String,
    pub intent: Intent,
    #[serde(default)]
    pub entities: Entities,
    #[serde(default)]
    pub context_data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub model: String,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub final_answer: String,
    pub metadata: GenerationMetadata,
}

// ── Stage seam ────────────────────────────────────────────────────────────────

pub trait Generator: Send + Sync {
    fn generate(&self, request: &GenerationRequest)
    -> impl Future<Output = Result<GenerationOutput, GenerationError>> + Send;
}

// ── In-process service ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GenerationService<B = LlmProvider> {
    client: GenerationClient<B>,
    breaker: Arc<CircuitBreaker>,
    detector: WeakResponseDetector,
    limits: PromptLimits,
    metrics: GenerationMetrics,
}

impl<B: ChatCompletion> GenerationService<B> {
    pub fn new(
        client: GenerationClient<B>,
        breaker: Arc<CircuitBreaker>,
        detector: WeakResponseDetector,
        limits: PromptLimits,
        metrics: GenerationMetrics,
    ) -> Self {
        Self { client, breaker, detector, limits, metrics }
    }

    pub fn from_config(backend: B, cfg: &GenerationConfig) -> Result<Self, AppError> {
        let policy = RetryPolicy {
            retries: cfg.retries,
            backoff_base: cfg.backoff_base,
            attempt_timeout: cfg.attempt_timeout,
        };
        Ok(Self::new(
            GenerationClient::new(backend, policy),
            Arc::new(CircuitBreaker::new(cfg.fail_threshold, cfg.cooldown)),
            WeakResponseDetector::new(cfg.min_answer_chars),
            PromptLimits { max_user_chars: cfg.max_user_chars, max_context_chars: cfg.max_context_chars },
            GenerationMetrics::new()?,
        ))
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn backend(&self) -> &B {
        self.client.backend()
    }

    pub fn metrics(&self) -> &GenerationMetrics {
        &self.metrics
    }
}

impl<B: ChatCompletion> Generator for GenerationService<B> {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        if !self.breaker.allow() {
            debug!(intent = %request.intent, "breaker open; rejecting without outbound call");
            return Err(GenerationError::BreakerOpen);
        }

        let prompt = prompt::build_prompt(request, &self.limits);
        self.metrics.requests_total.inc();
        let started = Instant::now();

        let result = match self.client.generate(&prompt.system, &prompt.user).await {
            Ok(answer) if self.detector.is_weak(&answer) => {
                warn!(answer_chars = answer.chars().count(), "weak model answer rejected");
                Err(GenerationError::WeakAnswer)
            }
            other => other,
        };
        self.metrics.latency_seconds.observe(started.elapsed().as_secs_f64());
        self.breaker.record(result.is_ok());

        let answer = result?;
        Ok(GenerationOutput {
            final_answer: answer,
            metadata: GenerationMetadata {
                model: self.client.backend().name().to_string(),
                latency_ms: started.elapsed().as_millis() as u64,
            },
        })
    }
}

// ── Config-selected generator ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Generation {
    Local(GenerationService<LlmProvider>),
    Remote(RemoteGenerator),
}

impl Generation {
    /// Breaker state, when the breaker lives in this process.
    pub fn breaker_snapshot(&self) -> Option<BreakerSnapshot> {
        match self {
            Generation::Local(s) => Some(s.breaker().snapshot()),
            Generation::Remote(_) => None,
        }
    }

    /// Generation metrics, when requests are served in this process.
    pub fn metrics(&self) -> Option<&GenerationMetrics> {
        match self {
            Generation::Local(s) => Some(s.metrics()),
            Generation::Remote(_) => None,
        }
    }
}

impl Generator for Generation {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        match self {
            Generation::Local(s) => s.generate(request).await,
            Generation::Remote(r) => r.generate(request).await,
        }
    }
}
