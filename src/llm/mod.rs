//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations.
//! Add a new variant + module in `providers/` for each additional backend.
//!
//! Provider instances are shared immutable capabilities — clone them freely.
//! Retry, timeout and quality gating live one layer up, in the generation
//! stage; a provider performs exactly one round-trip per call.

pub mod providers;

use thiserror::Error;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("provider transport failure: {0}")]
    Transport(String),
    #[error("provider request timed out")]
    Timeout,
    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
///
/// Enum dispatch avoids `dyn` trait objects; adding a backend means a new
/// module, a new variant and a new `complete` arm.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Dummy(providers::dummy::DummyProvider),
    OpenAiCompatible(providers::openai_compatible::OpenAiCompatibleProvider),
}

impl LlmProvider {
    /// Send `user` (with `system` as the system prompt) and return the reply text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        match self {
            LlmProvider::Dummy(p) => p.complete(user).await,
            LlmProvider::OpenAiCompatible(p) => p.complete(user, Some(system)).await,
        }
    }

    /// Short label for logs and health output.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Dummy(_) => "dummy",
            LlmProvider::OpenAiCompatible(_) => "openai-compatible",
        }
    }
}
