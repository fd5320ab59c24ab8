//! HTTP generator — `POST {url}` with the shared secret in `x-api-key`.
//!
//! The remote service owns retries and its own breaker; this side makes a
//! single call and maps the status codes back onto [`GenerationError`].

use std::time::Duration;

use reqwest::Client;

use super::{GenerationError, GenerationOutput, GenerationRequest};
use crate::subsystems::remote::{self, RemoteError};

/// Header carrying the shared secret between services.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct RemoteGenerator {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl RemoteGenerator {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, GenerationError> {
        let client = remote::client_with_timeout(timeout)
            .map_err(|e| GenerationError::Transport(format!("client build failed: {e}")))?;
        Ok(Self { client, url: url.into(), api_key })
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutput, GenerationError> {
        let headers: Vec<(&str, &str)> = self.api_key.as_deref().map(|k| (API_KEY_HEADER, k)).into_iter().collect();
        remote::post_json(&self.client, &self.url, request, &headers)
            .await
            .map_err(map_remote_error)
    }
}

fn map_remote_error(e: RemoteError) -> GenerationError {
    match e {
        RemoteError::Status { status: 401, .. } => GenerationError::Unauthorized,
        RemoteError::Status { status: 503, .. } => GenerationError::BreakerOpen,
        RemoteError::Status { status, body } => GenerationError::Status { status, message: body },
        RemoteError::Timeout => GenerationError::Timeout,
        RemoteError::Transport(m) => GenerationError::Transport(m),
        RemoteError::Malformed(m) => GenerationError::Malformed(m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_stage_errors() {
        let e = map_remote_error(RemoteError::Status { status: 401, body: String::new() });
        assert!(matches!(e, GenerationError::Unauthorized));
        let e = map_remote_error(RemoteError::Status { status: 503, body: String::new() });
        assert!(matches!(e, GenerationError::BreakerOpen));
        let e = map_remote_error(RemoteError::Status { status: 502, body: "x".into() });
        assert!(matches!(e, GenerationError::Status { status: 502, .. }));
    }

    #[tokio::test]
    async fn unreachable_generator_is_transport_error() {
        let g = RemoteGenerator::new("http://127.0.0.1:9/generate", Some("k".into()), Duration::from_secs(2)).unwrap();
        let req = GenerationRequest {
            user_message: "x".into(),
            intent: crate::subsystems::nlu::Intent::General,
            entities: Default::default(),
            context_data: String::new(),
            request_id: None,
        };
        let err = g.generate(&req).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transport(_) | GenerationError::Timeout));
    }
}
