//! Prompt assembly. Pure and deterministic.

use super::GenerationRequest;

pub const DEFAULT_MAX_USER_CHARS: usize = 1200;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 1800;

pub const SYSTEM_PROMPT: &str = "You are an agriculture expert. Reply in simple Hinglish. \
     If unsure, ask ONE concise clarifying question.";

const CONSTRAINTS: &str = "Constraints:\n\
     - Short, practical steps\n\
     - No hallucination, do not invent doses or product names\n\
     - If context is insufficient, ask ONE clarifying question\n\
     - End with ONE next action for the farmer";

#[derive(Debug, Clone, Copy)]
pub struct PromptLimits {
    pub max_user_chars: usize,
    pub max_context_chars: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self { max_user_chars: DEFAULT_MAX_USER_CHARS, max_context_chars: DEFAULT_MAX_CONTEXT_CHARS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub fn build_prompt(request: &GenerationRequest, limits: &PromptLimits) -> Prompt {
    let user_message = truncate_chars(&request.user_message, limits.max_user_chars);
    let context = truncate_chars(&request.context_data, limits.max_context_chars);

    let user = format!(
        "User Query: {user_message}\n\
         Intent: {}\n\
         Entities: {}\n\
         Context: {context}\n\
         {CONSTRAINTS}",
        request.intent, request.entities,
    );

    Prompt { system: SYSTEM_PROMPT.to_string(), user }
}

/// Keep at most `limit` characters; never splits a code point.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::nlu::{Entities, Intent};

    fn request(message: &str, context: &str) -> GenerationRequest {
        GenerationRequest {
            user_message: message.into(),
            intent: Intent::Disease,
            entities: Entities { crop: Some("dhaan".into()) },
            context_data: context.into(),
            request_id: None,
        }
    }

    #[test]
    fn user_block_embeds_all_fields() {
        let p = build_prompt(&request("patte par daag", "Neck Blast"), &PromptLimits::default());
        assert_eq!(p.system, SYSTEM_PROMPT);
        assert!(p.user.starts_with("User Query: patte par daag\nIntent: disease\nEntities: crop=dhaan\nContext: Neck Blast\n"));
        assert!(p.user.ends_with("End with ONE next action for the farmer"));
    }

    #[test]
    fn missing_entities_render_none() {
        let mut r = request("x", "");
        r.entities = Entities::default();
        assert!(build_prompt(&r, &PromptLimits::default()).user.contains("Entities: none\n"));
    }

    #[test]
    fn long_inputs_are_truncated_silently() {
        let long_message = "a".repeat(5000);
        let long_context = "b".repeat(5000);
        let p = build_prompt(&request(&long_message, &long_context), &PromptLimits::default());
        assert!(p.user.contains(&format!("User Query: {}\n", "a".repeat(1200))));
        assert!(!p.user.contains(&"a".repeat(1201)));
        assert!(p.user.contains(&format!("Context: {}\n", "b".repeat(1800))));
        assert!(!p.user.contains(&"b".repeat(1801)));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("गेहूं", 2), "गे");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn deterministic() {
        let r = request("q", "c");
        assert_eq!(build_prompt(&r, &PromptLimits::default()), build_prompt(&r, &PromptLimits::default()));
    }
}
