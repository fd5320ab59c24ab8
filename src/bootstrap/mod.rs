//! Process bootstrap helpers.
//!
//! - **logger** — tracing subscriber initialisation.

pub mod logger;
