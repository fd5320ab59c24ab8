//! Retrying wrapper around one chat-completion backend.
//!
//! Attempts are bounded by `retries + 1`. Only transient failures
//! (transport, timeout, 5xx) are retried, with linear backoff
//! `backoff_base * attempt`. The last error is the one returned.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use super::GenerationError;
use crate::llm::LlmProvider;

/// One round-trip to a language model.
pub trait ChatCompletion: Send + Sync {
    fn complete(&self, system: &str, user: &str) -> impl Future<Output = Result<String, GenerationError>> + Send;

    /// Label reported in response metadata.
    fn name(&self) -> &str;
}

impl ChatCompletion for LlmProvider {
    async fn complete(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        LlmProvider::complete(self, system, user).await.map_err(GenerationError::from)
    }

    fn name(&self) -> &str {
        LlmProvider::name(self)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff_base: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff_base: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GenerationClient<B> {
    backend: B,
    policy: RetryPolicy,
}

impl<B: ChatCompletion> GenerationClient<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(
                self.policy.attempt_timeout,
                self.backend.complete(system, user),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout),
            };

            match outcome {
                Ok(text) => {
                    debug!(attempt, backend = self.backend.name(), "generation attempt succeeded");
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt <= self.policy.retries => {
                    let delay = self.policy.backoff_base.saturating_mul(attempt);
                    warn!(
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "generation attempt failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "generation failed");
                    return Err(e);
                }
            }
        }
    }
}
