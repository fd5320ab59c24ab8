//! Weak-answer gate.
//!
//! An answer is weak when it is empty, shorter than the minimum length after
//! trimming, or contains a hedge/apology phrase (case-insensitive).

pub const DEFAULT_MIN_CHARS: usize = 40;

const HEDGE_PHRASES: &[&str] = &[
    "sorry",
    "i cannot",
    "i can't",
    "i am unable",
    "i'm unable",
    "unable to help",
    "i don't know",
    "i do not know",
    "i'm not sure",
    "i am not sure",
    "as an ai",
    "maaf kijiye",
    "pata nahi",
];

#[derive(Debug, Clone, Copy)]
pub struct WeakResponseDetector {
    min_chars: usize,
}

impl Default for WeakResponseDetector {
    fn default() -> Self {
        Self { min_chars: DEFAULT_MIN_CHARS }
    }
}

impl WeakResponseDetector {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    pub fn is_weak(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.chars().count() < self.min_chars {
            return true;
        }
        let lower = trimmed.to_lowercase();
        HEDGE_PHRASES.iter().any(|p| lower.contains(p))
    }
}

/// [`WeakResponseDetector::is_weak`] with the default minimum length.
pub fn is_weak(text: &str) -> bool {
    WeakResponseDetector::default().is_weak(text)
}
