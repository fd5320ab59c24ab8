//! Intent classifier stage — text → `{intent, crop, language}`.
//!
//! The orchestrator only sees the [`IntentClassifier`] trait. [`Classifier`]
//! is the enum the binary wires up from config: the keyword tables in
//! [`rules`] or an HTTP `/analyze` collaborator in [`remote`].

pub mod remote;
pub mod rules;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use remote::RemoteClassifier;
pub use rules::RuleClassifier;

/// Language tag reported by the local classifier.
pub const DEFAULT_LANGUAGE: &str = "hi-en";

// ── Types ─────────────────────────────────────────────────────────────────────

/// Coarse category of the user's need.
///
/// Deserialisation is lenient: unknown labels become `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Intent {
    Fertilizer,
    Disease,
    Water,
    Price,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Fertilizer => "fertilizer",
            Intent::Disease => "disease",
            Intent::Water => "water",
            Intent::Price => "price",
            Intent::General => "general",
        }
    }

    /// Parse a wire label. Anything unrecognised is `General`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "fertilizer" => Intent::Fertilizer,
            "disease" => Intent::Disease,
            "water" => Intent::Water,
            "price" => Intent::Price,
            _ => Intent::General,
        }
    }
}

impl From<String> for Intent {
    fn from(label: String) -> Self {
        Intent::from_label(&label)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentResult {
    pub intent: Intent,
    pub crop: Option<String>,
    pub language: String,
}

impl IntentResult {
    /// What the pipeline assumes when classification is unavailable.
    pub fn general() -> Self {
        Self { intent: Intent::General, crop: None, language: DEFAULT_LANGUAGE.to_string() }
    }

    pub fn entities(&self) -> Entities {
        Entities { crop: self.crop.clone() }
    }
}

/// Structured values pulled out of the message. Only the crop for now.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub crop: Option<String>,
}

impl fmt::Display for Entities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.crop {
            Some(crop) => write!(f, "crop={crop}"),
            None => f.write_str("none"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("malformed classifier response: {0}")]
    Malformed(String),
}

// ── Wire types (`POST /analyze`) ──────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub intent: String,
    #[serde(default)]
    pub crop: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl From<AnalyzeResponse> for IntentResult {
    fn from(r: AnalyzeResponse) -> Self {
        Self {
            intent: Intent::from_label(&r.intent),
            crop: r.crop.map(|c| c.trim().to_lowercase()).filter(|c| !c.is_empty()),
            language: r.language,
        }
    }
}

impl From<&IntentResult> for AnalyzeResponse {
    fn from(r: &IntentResult) -> Self {
        Self {
            intent: r.intent.as_str().to_string(),
            crop: r.crop.clone(),
            language: r.language.clone(),
        }
    }
}

// ── Stage seam ────────────────────────────────────────────────────────────────

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, message: &str) -> impl Future<Output = Result<IntentResult, ClassifierError>> + Send;
}

/// Config-selected classifier backend.
#[derive(Debug, Clone)]
pub enum Classifier {
    Rules(RuleClassifier),
    Remote(RemoteClassifier),
}

impl IntentClassifier for Classifier {
    async fn classify(&self, message: &str) -> Result<IntentResult, ClassifierError> {
        match self {
            Classifier::Rules(c) => Ok(c.detect(message)),
            Classifier::Remote(c) => c.classify(message).await,
        }
    }
}
