//! Resolved configuration types consumed by the stages.

use std::path::PathBuf;
use std::time::Duration;

/// Where a pipeline collaborator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    /// Implemented inside this process.
    Local,
    /// Reached over HTTP at the configured URL.
    Remote,
}

/// Intent classifier stage (`[classifier]`).
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub mode: StageMode,
    /// Full `/analyze` endpoint URL, used in remote mode.
    pub url: String,
    pub timeout: Duration,
}

/// Knowledge lookup stage (`[knowledge]`).
#[derive(Debug, Clone)]
pub struct KnowledgeConfig {
    pub mode: StageMode,
    /// SQLite knowledge file (already resolved against `work_dir`).
    pub db_path: PathBuf,
    /// Full `/query` endpoint URL, used in remote mode.
    pub url: String,
    pub timeout: Duration,
}

/// Generation stage (`[generation]`): retry policy, breaker and prompt limits.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub mode: StageMode,
    /// Full `/generate` endpoint URL, used in remote mode.
    pub url: String,
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Backoff before retry `n` (0-based) is `backoff_base * (n + 1)`.
    pub backoff_base: Duration,
    pub attempt_timeout: Duration,
    pub min_answer_chars: usize,
    pub fail_threshold: u32,
    pub cooldown: Duration,
    pub max_user_chars: usize,
    pub max_context_chars: usize,
}

/// Conversation log storage (`[storage]`).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// SQLite history file (already resolved against `work_dir`).
    pub history_path: PathBuf,
}

/// OpenAI / OpenAI-compatible provider configuration.
/// Populated from `[llm.openai]` in the TOML.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature (ignored for models that forbid it).
    pub temperature: f32,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    /// Completion token cap sent as `max_tokens`.
    pub max_tokens: u32,
}

/// LLM provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which provider is active (`"dummy"`, `"openai"`, `"openai-compatible"`).
    /// Maps to `default` in `[llm]` TOML.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Fully-resolved service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub service_name: String,
    /// Socket address the HTTP surface binds to.
    pub bind: String,
    /// Working directory for all persistent data (already expanded, no `~`).
    pub work_dir: PathBuf,
    pub log_level: String,
    pub classifier: ClassifierConfig,
    pub knowledge: KnowledgeConfig,
    pub generation: GenerationConfig,
    pub storage: StorageConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env var — `None` for keyless local models.
    /// Never sourced from TOML.
    pub llm_api_key: Option<String>,
    /// Shared secret for `/generate`, from `SERVICE_API_KEY`. When `None` the
    /// endpoint rejects every request.
    pub service_api_key: Option<String>,
}
