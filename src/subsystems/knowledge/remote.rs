//! HTTP knowledge lookup — `POST {url}` with `{intent, crop, message}`.

use std::time::Duration;

use reqwest::Client;

use super::{KnowledgeError, KnowledgeQuery, KnowledgeResult};
use crate::subsystems::remote::{self, RemoteError};

#[derive(Debug, Clone)]
pub struct RemoteKnowledge {
    client: Client,
    url: String,
}

impl RemoteKnowledge {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, KnowledgeError> {
        let client = remote::client_with_timeout(timeout)
            .map_err(|e| KnowledgeError::Unavailable(format!("client build failed: {e}")))?;
        Ok(Self { client, url: url.into() })
    }

    pub async fn lookup(&self, query: &KnowledgeQuery) -> Result<KnowledgeResult, KnowledgeError> {
        remote::post_json(&self.client, &self.url, query, &[])
            .await
            .map_err(|e| match e {
                RemoteError::Malformed(m) => KnowledgeError::Malformed(m),
                other => KnowledgeError::Unavailable(other.to_string()),
            })
    }
}
