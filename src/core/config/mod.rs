//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `AGRI_WORK_DIR`, `AGRI_LOG_LEVEL` and `AGRI_BIND` overrides.
//! Secrets (`LLM_API_KEY`, `SERVICE_API_KEY`) come from the environment only.
//!
//! # Module layout
//!
//! - **types** — public configuration structs consumed by the stages.
//! - **raw** — raw TOML deserialization types with serde defaults; private.
//! - **load** — `load`, `load_from`, `expand_home`.

mod load;
mod raw;
mod types;

pub use load::{MAX_COOLDOWN_SECONDS, MAX_RETRIES, Overrides, expand_home, load, load_from};
pub use types::*;

#[cfg(test)]
impl Config {
    /// Safe `Config` for tests — dummy LLM, local stages, no API keys,
    /// zero backoff so retries do not sleep.
    pub fn test_default(work_dir: &std::path::Path) -> Self {
        use std::time::Duration;

        Self {
            service_name: "test".into(),
            bind: "127.0.0.1:0".into(),
            work_dir: work_dir.to_path_buf(),
            log_level: "info".into(),
            classifier: ClassifierConfig {
                mode: StageMode::Local,
                url: "http://localhost:0/analyze".into(),
                timeout: Duration::from_secs(1),
            },
            knowledge: KnowledgeConfig {
                mode: StageMode::Local,
                db_path: work_dir.join("agri_knowledge.db"),
                url: "http://localhost:0/query".into(),
                timeout: Duration::from_secs(1),
            },
            generation: GenerationConfig {
                mode: StageMode::Local,
                url: "http://localhost:0/generate".into(),
                retries: 2,
                backoff_base: Duration::ZERO,
                attempt_timeout: Duration::from_secs(1),
                min_answer_chars: 40,
                fail_threshold: 3,
                cooldown: Duration::from_secs(30),
                max_user_chars: 1200,
                max_context_chars: 1800,
            },
            storage: StorageConfig {
                history_path: work_dir.join("chat_history.db"),
            },
            llm: LlmConfig {
                provider: "dummy".into(),
                openai: OpenAiConfig {
                    api_base_url: "http://localhost:0/v1/chat/completions".into(),
                    model: "test-model".into(),
                    temperature: 0.0,
                    timeout_seconds: 1,
                    max_tokens: 64,
                },
            },
            llm_api_key: None,
            service_api_key: Some("test-service-key".into()),
        }
    }
}
