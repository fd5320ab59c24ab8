//! Canned answers: knowledge hits and per-intent clarification prompts.

use crate::subsystems::knowledge::capitalize;
use crate::subsystems::nlu::Intent;

pub const FERTILIZER_FALLBACK: &str =
    "Khaad ki sahi salah ke liye kripya fasal ka naam batayein (jaise gehu, dhaan, sarson).";
pub const DISEASE_FALLBACK: &str =
    "Bimari pehchanne ke liye kripya lakshan detail me batayein: patton par daag ka rang, \
     kis hisse par asar hai, aur kab se dikh raha hai.";
pub const WATER_FALLBACK: &str =
    "Sinchai ki salah ke liye kripya fasal ka naam, abhi ka mausam aur fasal ki avastha batayein.";
pub const PRICE_FALLBACK: &str =
    "Bhav batane ke liye kripya fasal ka naam aur apni nazdeeki mandi ka naam batayein.";
pub const GENERIC_FALLBACK: &str = "Is sawal ke liye abhi exact jankari uplabdh nahi hai. \
     Kripya fasal ka naam, fasal ki avastha (growth stage) aur lakshan thoda detail me batayein.";

/// Answer built straight from structured knowledge; `context` is embedded verbatim.
pub fn knowledge_answer(crop: Option<&str>, context: &str) -> String {
    match crop.map(str::trim).filter(|c| !c.is_empty()) {
        Some(crop) => format!("✅ {} ke liye jankari:\n{context}", capitalize(crop)),
        None => format!("✅ Jankari:\n{context}"),
    }
}

/// Clarification request used when generation is unusable.
pub fn fallback_answer(intent: Intent) -> &'static str {
    match intent {
        Intent::Fertilizer => FERTILIZER_FALLBACK,
        Intent::Disease => DISEASE_FALLBACK,
        Intent::Water => WATER_FALLBACK,
        Intent::Price => PRICE_FALLBACK,
        Intent::General => GENERIC_FALLBACK,
    }
}
