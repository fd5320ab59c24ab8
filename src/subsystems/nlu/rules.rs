//! Keyword-table classifier.
//!
//! Crop and intent are detected independently by lower-cased substring
//! match; the first matching table row wins.

use super::{DEFAULT_LANGUAGE, Intent, IntentResult};

/// `(canonical crop, aliases)`.
const CROPS: &[(&str, &[&str])] = &[
    ("gehu", &["gehu", "wheat"]),
    ("dhaan", &["dhaan", "chawal", "rice"]),
    ("sarson", &["sarson", "mustard"]),
];

const INTENTS: &[(Intent, &[&str])] = &[
    (Intent::Fertilizer, &["khaad", "fertilizer", "urvarak"]),
    (Intent::Disease, &["bimari", "rog", "disease", "daag", "spot"]),
    (Intent::Water, &["paani", "sinchai", "irrigation", "water"]),
    (Intent::Price, &["daam", "bhav", "mandi", "price"]),
];

#[derive(Debug, Clone, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn detect(&self, text: &str) -> IntentResult {
        let t = text.to_lowercase();

        let crop = CROPS
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| t.contains(a)))
            .map(|(crop, _)| crop.to_string());

        let intent = INTENTS
            .iter()
            .find(|(_, words)| words.iter().any(|w| t.contains(w)))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::General);

        IntentResult { intent, crop, language: DEFAULT_LANGUAGE.to_string() }
    }
}
