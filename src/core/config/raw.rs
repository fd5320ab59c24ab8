//! Raw TOML shape — `serde` target before resolution.
//!
//! Every section is optional; missing keys fall back to the defaults below.

use serde::Deserialize;

#[derive(Deserialize, Default)]
pub(super) struct RawConfig {
    #[serde(default)]
    pub service: RawService,
    #[serde(default)]
    pub classifier: RawClassifier,
    #[serde(default)]
    pub knowledge: RawKnowledge,
    #[serde(default)]
    pub generation: RawGeneration,
    #[serde(default)]
    pub storage: RawStorage,
    #[serde(default)]
    pub llm: RawLlm,
}

#[derive(Deserialize)]
pub(super) struct RawService {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for RawService {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            bind: default_bind(),
            work_dir: default_work_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawClassifier {
    #[serde(default = "default_rules_mode")]
    pub mode: String,
    #[serde(default = "default_classifier_url")]
    pub url: String,
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RawClassifier {
    fn default() -> Self {
        Self {
            mode: default_rules_mode(),
            url: default_classifier_url(),
            timeout_seconds: default_collaborator_timeout(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawKnowledge {
    #[serde(default = "default_sqlite_mode")]
    pub mode: String,
    #[serde(default = "default_knowledge_file")]
    pub db_file: String,
    #[serde(default = "default_knowledge_url")]
    pub url: String,
    #[serde(default = "default_collaborator_timeout")]
    pub timeout_seconds: u64,
}

impl Default for RawKnowledge {
    fn default() -> Self {
        Self {
            mode: default_sqlite_mode(),
            db_file: default_knowledge_file(),
            url: default_knowledge_url(),
            timeout_seconds: default_collaborator_timeout(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawGeneration {
    #[serde(default = "default_local_mode")]
    pub mode: String,
    #[serde(default = "default_generation_url")]
    pub url: String,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_seconds: u64,
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
    #[serde(default = "default_fail_threshold")]
    pub fail_threshold: u32,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
    #[serde(default = "default_max_user_chars")]
    pub max_user_chars: usize,
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RawGeneration {
    fn default() -> Self {
        Self {
            mode: default_local_mode(),
            url: default_generation_url(),
            retries: default_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            attempt_timeout_seconds: default_attempt_timeout(),
            min_answer_chars: default_min_answer_chars(),
            fail_threshold: default_fail_threshold(),
            cooldown_seconds: default_cooldown(),
            max_user_chars: default_max_user_chars(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

#[derive(Deserialize)]
pub(super) struct RawStorage {
    #[serde(default = "default_history_file")]
    pub history_file: String,
}

impl Default for RawStorage {
    fn default() -> Self {
        Self { history_file: default_history_file() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub openai: RawOpenAiConfig,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAiConfig::default() }
    }
}

#[derive(Deserialize)]
pub(super) struct RawOpenAiConfig {
    #[serde(default = "default_openai_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_openai_model")]
    pub model: String,
    #[serde(default = "default_openai_temperature")]
    pub temperature: f32,
    #[serde(default = "default_openai_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_openai_max_tokens")]
    pub max_tokens: u32,
}

impl Default for RawOpenAiConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: default_openai_temperature(),
            timeout_seconds: default_openai_timeout_seconds(),
            max_tokens: default_openai_max_tokens(),
        }
    }
}

fn default_service_name() -> String { "agri-assist".to_string() }
fn default_bind() -> String { "127.0.0.1:8000".to_string() }
fn default_work_dir() -> String { "~/.agri-assist".to_string() }
fn default_log_level() -> String { "info".to_string() }

fn default_rules_mode() -> String { "rules".to_string() }
fn default_sqlite_mode() -> String { "sqlite".to_string() }
fn default_local_mode() -> String { "local".to_string() }
fn default_collaborator_timeout() -> u64 { 10 }

fn default_classifier_url() -> String { "http://nlu_llm:8000/analyze".to_string() }
fn default_knowledge_url() -> String { "http://rag_service:8000/query".to_string() }
fn default_generation_url() -> String { "http://llm_service:8000/generate".to_string() }
fn default_knowledge_file() -> String { "agri_knowledge.db".to_string() }
fn default_history_file() -> String { "chat_history.db".to_string() }

fn default_retries() -> u32 { 2 }
fn default_backoff_base_ms() -> u64 { 1000 }
fn default_attempt_timeout() -> u64 { 20 }
fn default_min_answer_chars() -> usize { 40 }
fn default_fail_threshold() -> u32 { 3 }
fn default_cooldown() -> u64 { 30 }
fn default_max_user_chars() -> usize { 1200 }
fn default_max_context_chars() -> usize { 1800 }

fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-4o-mini".to_string() }
fn default_openai_temperature() -> f32 { 0.2 }
fn default_openai_timeout_seconds() -> u64 { 20 }
fn default_openai_max_tokens() -> u32 { 350 }
