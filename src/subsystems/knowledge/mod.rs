//! Knowledge lookup stage — `{intent, crop, message}` → `{context, source}`.
//!
//! `source = generic` is the sentinel for "no structured match"; every other
//! source is a terminal answer and the generation stage is skipped.

pub mod remote;
pub mod sqlite;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::subsystems::nlu::Intent;

pub use remote::RemoteKnowledge;
pub use sqlite::SqliteKnowledge;

/// Context returned alongside the `generic` sentinel.
pub const GENERIC_CONTEXT: &str = "Abhi is query ke liye specific data nahi mila.";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum KnowledgeSource {
    FertilizerTable,
    DiseaseTable,
    CropCalendar,
    Generic,
    /// A source label this build does not know; still a terminal answer.
    Other(String),
}

impl KnowledgeSource {
    pub fn as_str(&self) -> &str {
        match self {
            KnowledgeSource::FertilizerTable => "fertilizer_table",
            KnowledgeSource::DiseaseTable => "disease_table",
            KnowledgeSource::CropCalendar => "crop_calendar",
            KnowledgeSource::Generic => "generic",
            KnowledgeSource::Other(s) => s,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, KnowledgeSource::Generic)
    }
}

impl From<String> for KnowledgeSource {
    fn from(s: String) -> Self {
        match s.as_str() {
            "fertilizer_table" => KnowledgeSource::FertilizerTable,
            "disease_table" => KnowledgeSource::DiseaseTable,
            "crop_calendar" => KnowledgeSource::CropCalendar,
            "generic" => KnowledgeSource::Generic,
            _ => KnowledgeSource::Other(s),
        }
    }
}

impl From<KnowledgeSource> for String {
    fn from(s: KnowledgeSource) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for KnowledgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeResult {
    pub context: String,
    pub source: KnowledgeSource,
}

impl KnowledgeResult {
    pub fn generic() -> Self {
        Self { context: GENERIC_CONTEXT.to_string(), source: KnowledgeSource::Generic }
    }
}

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("knowledge store error: {0}")]
    Store(String),
    #[error("knowledge service unavailable: {0}")]
    Unavailable(String),
    #[error("malformed knowledge response: {0}")]
    Malformed(String),
}

/// Wire request for `POST /query`; also the lookup key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeQuery {
    pub intent: Intent,
    #[serde(default)]
    pub crop: Option<String>,
    pub message: String,
}

/// Upper-case the first character, leave the rest untouched.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Stage seam ────────────────────────────────────────────────────────────────

pub trait KnowledgeLookup: Send + Sync {
    fn lookup(&self, query: &KnowledgeQuery) -> impl Future<Output = Result<KnowledgeResult, KnowledgeError>> + Send;
}

/// Config-selected knowledge backend.
#[derive(Debug, Clone)]
pub enum Knowledge {
    Sqlite(SqliteKnowledge),
    Remote(RemoteKnowledge),
}

impl KnowledgeLookup for Knowledge {
    async fn lookup(&self, query: &KnowledgeQuery) -> Result<KnowledgeResult, KnowledgeError> {
        match self {
            Knowledge::Sqlite(k) => k.lookup(query).await,
            Knowledge::Remote(k) => k.lookup(query).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_labels_round_trip_known_and_unknown() {
        let s: KnowledgeSource = serde_json::from_str("\"disease_table\"").unwrap();
        assert_eq!(s, KnowledgeSource::DiseaseTable);
        let other: KnowledgeSource = serde_json::from_str("\"pdf_index\"").unwrap();
        assert_eq!(other, KnowledgeSource::Other("pdf_index".into()));
        assert!(!other.is_generic());
        assert_eq!(serde_json::to_string(&other).unwrap(), "\"pdf_index\"");
    }

    #[test]
    fn only_generic_is_generic() {
        assert!(KnowledgeResult::generic().source.is_generic());
        assert!(!KnowledgeSource::CropCalendar.is_generic());
    }

    #[test]
    fn capitalize_handles_empty_and_unicode() {
        assert_eq!(capitalize("gehu"), "Gehu");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("éclair"), "Éclair");
    }

    #[test]
    fn query_maps_unknown_intent_to_general() {
        let q: KnowledgeQuery =
            serde_json::from_str(r#"{"intent":"weather","crop":null,"message":"x"}"#).unwrap();
        assert_eq!(q.intent, Intent::General);
        assert_eq!(q.crop, None);
    }
}
