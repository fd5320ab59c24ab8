//! Offline provider — answers without any network call.
//!
//! The reply never quotes the user's text: only the `Intent:` line of the
//! assembled prompt is read, and it is normalised to a known label first.

use crate::llm::ProviderError;
use crate::subsystems::nlu::Intent;

#[derive(Debug, Clone)]
pub struct DummyProvider;

impl DummyProvider {
    pub async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let intent = prompt
            .lines()
            .find_map(|l| l.strip_prefix("Intent:"))
            .map(Intent::from_label)
            .unwrap_or(Intent::General);
        Ok(format!(
            "[offline] Intent: {intent}. Agla kadam: fasal ka naam aur avastha note karein, \
             phir apne nazdeeki krishi vigyan kendra se salah lein."
        ))
    }
}
