//! Application-wide error types.
//!
//! Stage-specific errors (classifier, knowledge, generation) live next to
//! their stage; `AppError` covers startup, storage and transport plumbing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
