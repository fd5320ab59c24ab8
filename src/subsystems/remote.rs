//! Shared JSON-over-HTTP call used by every remote collaborator.
//!
//! Each stage maps [`RemoteError`] into its own error type; this module only
//! knows about transport, status and payload shape.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Build a client with a fixed per-request timeout.
pub fn client_with_timeout(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// POST `body` as JSON to `url` and decode a JSON reply.
///
/// `headers` are added verbatim (used for the shared-secret header).
pub async fn post_json<Req, Resp>(
    client: &Client,
    url: &str,
    body: &Req,
    headers: &[(&str, &str)],
) -> Result<Resp, RemoteError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let mut req = client.post(url).json(body);
    for (name, value) in headers {
        req = req.header(*name, *value);
    }

    let response = req.send().await.map_err(|e| {
        if e.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Transport(e.to_string())
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        debug!(%url, %status, "remote collaborator returned non-success");
        return Err(RemoteError::Status { status: status.as_u16(), body });
    }

    response
        .json::<Resp>()
        .await
        .map_err(|e| RemoteError::Malformed(e.to_string()))
}
