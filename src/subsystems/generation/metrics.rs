//! Prometheus metrics for the generation stage.
//!
//! Each service owns its own [`Registry`]; `/metrics` renders it in the text
//! exposition format.

use std::fmt;

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use crate::error::AppError;

#[derive(Clone)]
pub struct GenerationMetrics {
    /// Requests that passed the breaker and reached the model client.
    pub requests_total: IntCounter,
    /// Wall time of the model client call, successful or not.
    pub latency_seconds: Histogram,
    registry: Registry,
}

impl fmt::Debug for GenerationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationMetrics")
            .field("requests_total", &self.requests_total.get())
            .field("latency_count", &self.latency_seconds.get_sample_count())
            .finish()
    }
}

impl GenerationMetrics {
    pub fn new() -> Result<Self, AppError> {
        let registry = Registry::new();

        let requests_total = IntCounter::new("llm_requests_total", "Total LLM requests")
            .map_err(|e| AppError::Metrics(format!("llm_requests_total: {e}")))?;
        registry
            .register(Box::new(requests_total.clone()))
            .map_err(|e| AppError::Metrics(format!("register llm_requests_total: {e}")))?;

        let latency_seconds =
            Histogram::with_opts(HistogramOpts::new("llm_request_latency_seconds", "LLM request latency"))
                .map_err(|e| AppError::Metrics(format!("llm_request_latency_seconds: {e}")))?;
        registry
            .register(Box::new(latency_seconds.clone()))
            .map_err(|e| AppError::Metrics(format!("register llm_request_latency_seconds: {e}")))?;

        Ok(Self { requests_total, latency_seconds, registry })
    }

    /// Render every metric in Prometheus text format.
    pub fn export(&self) -> Result<String, AppError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| AppError::Metrics(format!("encode: {e}")))?;
        String::from_utf8(buffer).map_err(|e| AppError::Metrics(format!("encode: {e}")))
    }
}

/// `Content-Type` of [`GenerationMetrics::export`].
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_includes_both_series() {
        let m = GenerationMetrics::new().unwrap();
        m.requests_total.inc();
        m.latency_seconds.observe(0.25);

        let text = m.export().unwrap();
        assert!(text.contains("llm_requests_total 1"), "{text}");
        assert!(text.contains("llm_request_latency_seconds_count 1"), "{text}");
    }

    #[test]
    fn registries_are_independent() {
        let a = GenerationMetrics::new().unwrap();
        let b = GenerationMetrics::new().unwrap();
        a.requests_total.inc();
        assert_eq!(a.requests_total.get(), 1);
        assert_eq!(b.requests_total.get(), 0);
    }

    #[test]
    fn content_type_is_text_format() {
        assert!(content_type().starts_with("text/plain"));
    }
}
