//! HTTP classifier — `POST {url}` with `{message}`.

use std::time::Duration;

use reqwest::Client;

use super::{AnalyzeRequest, AnalyzeResponse, ClassifierError, IntentResult};
use crate::subsystems::remote::{self, RemoteError};

#[derive(Debug, Clone)]
pub struct RemoteClassifier {
    client: Client,
    url: String,
}

impl RemoteClassifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = remote::client_with_timeout(timeout)
            .map_err(|e| ClassifierError::Unavailable(format!("client build failed: {e}")))?;
        Ok(Self { client, url: url.into() })
    }

    pub async fn classify(&self, message: &str) -> Result<IntentResult, ClassifierError> {
        let body = AnalyzeRequest { message: message.to_string() };
        let resp: AnalyzeResponse = remote::post_json(&self.client, &self.url, &body, &[])
            .await
            .map_err(|e| match e {
                RemoteError::Malformed(m) => ClassifierError::Malformed(m),
                other => ClassifierError::Unavailable(other.to_string()),
            })?;
        Ok(resp.into())
    }
}
