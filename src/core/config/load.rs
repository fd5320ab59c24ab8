//! Configuration loading with env-var overrides.
//!
//! Reads TOML files, supports `[meta] base = "..."` inheritance chains,
//! and applies `AGRI_WORK_DIR`, `AGRI_LOG_LEVEL` and `AGRI_BIND` overrides.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;

use super::raw::RawConfig;
use super::types::*;

/// Upper bound on `generation.retries`; the stage budget is linear in it.
pub const MAX_RETRIES: u32 = 10;
/// Upper bound on `generation.cooldown_seconds` (one day).
pub const MAX_COOLDOWN_SECONDS: u64 = 86_400;

/// Env-sourced overrides applied on top of the file values.
/// Tests build this directly instead of mutating the process environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub work_dir: Option<String>,
    pub log_level: Option<String>,
    pub bind: Option<String>,
}

impl Overrides {
    pub fn from_env() -> Self {
        Self {
            work_dir: env::var("AGRI_WORK_DIR").ok(),
            log_level: env::var("AGRI_LOG_LEVEL").ok(),
            bind: env::var("AGRI_BIND").ok(),
        }
    }
}

/// Deep-merge two TOML values.
/// Tables are merged recursively — the overlay only needs to specify keys that
/// differ from the base. For every other type the overlay value wins.
fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_tbl), toml::Value::Table(overlay_tbl)) => {
            for (key, ov_val) in overlay_tbl {
                let merged = match base_tbl.remove(&key) {
                    Some(base_val) => merge_toml(base_val, ov_val),
                    None => ov_val,
                };
                base_tbl.insert(key, merged);
            }
            toml::Value::Table(base_tbl)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file, follow any `[meta] base = "..."` chain, and return the
/// fully merged `toml::Value`. `visited` carries canonicalized paths already
/// seen in this chain so circular references are caught early.
fn load_raw_merged(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<toml::Value, AppError> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Err(AppError::Config(format!(
            "circular base reference detected at: {}",
            path.display()
        )));
    }

    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let overlay_val: toml::Value = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if let Some(base_str) = overlay_val
        .get("meta")
        .and_then(|m| m.get("base"))
        .and_then(|b| b.as_str())
    {
        let base_path = if Path::new(base_str).is_absolute() {
            PathBuf::from(base_str)
        } else {
            path.parent().unwrap_or(Path::new(".")).join(base_str)
        };
        let base_val = load_raw_merged(&base_path, visited)?;
        Ok(merge_toml(base_val, overlay_val))
    } else {
        Ok(overlay_val)
    }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, built-in defaults are used.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let overrides = Overrides::from_env();

    if let Some(path) = config_path {
        return load_from(Path::new(path), &overrides);
    }

    let default_path = Path::new("config/default.toml");
    if default_path.exists() {
        load_from(default_path, &overrides)
    } else {
        resolve(RawConfig::default(), &overrides)
    }
}

/// Internal loader — accepts an explicit path and overrides.
pub fn load_from(path: &Path, overrides: &Overrides) -> Result<Config, AppError> {
    let merged_val = load_raw_merged(path, &mut HashSet::new())?;

    let parsed: RawConfig = Deserialize::deserialize(merged_val)
        .map_err(|e: toml::de::Error| {
            AppError::Config(format!("config error in {}: {e}", path.display()))
        })?;
    resolve(parsed, overrides)
}

fn resolve(raw: RawConfig, overrides: &Overrides) -> Result<Config, AppError> {
    let s = raw.service;

    let work_dir = expand_home(overrides.work_dir.as_deref().unwrap_or(&s.work_dir));
    let log_level = overrides.log_level.clone().unwrap_or(s.log_level);
    let bind = overrides.bind.clone().unwrap_or(s.bind);

    let classifier_mode = parse_mode("classifier", &raw.classifier.mode, "rules", "remote")?;
    let knowledge_mode = parse_mode("knowledge", &raw.knowledge.mode, "sqlite", "remote")?;
    let generation_mode = parse_mode("generation", &raw.generation.mode, "local", "remote")?;

    let g = raw.generation;
    if g.fail_threshold == 0 {
        return Err(AppError::Config("generation.fail_threshold must be at least 1".into()));
    }
    if g.retries > MAX_RETRIES {
        return Err(AppError::Config(format!(
            "generation.retries must be at most {MAX_RETRIES}, got {}",
            g.retries
        )));
    }
    if g.cooldown_seconds > MAX_COOLDOWN_SECONDS {
        return Err(AppError::Config(format!(
            "generation.cooldown_seconds must be at most {MAX_COOLDOWN_SECONDS}, got {}",
            g.cooldown_seconds
        )));
    }

    Ok(Config {
        service_name: s.name,
        bind,
        log_level,
        classifier: ClassifierConfig {
            mode: classifier_mode,
            url: raw.classifier.url,
            timeout: Duration::from_secs(raw.classifier.timeout_seconds),
        },
        knowledge: KnowledgeConfig {
            mode: knowledge_mode,
            db_path: resolve_in(&work_dir, &raw.knowledge.db_file),
            url: raw.knowledge.url,
            timeout: Duration::from_secs(raw.knowledge.timeout_seconds),
        },
        generation: GenerationConfig {
            mode: generation_mode,
            url: g.url,
            retries: g.retries,
            backoff_base: Duration::from_millis(g.backoff_base_ms),
            attempt_timeout: Duration::from_secs(g.attempt_timeout_seconds),
            min_answer_chars: g.min_answer_chars,
            fail_threshold: g.fail_threshold,
            cooldown: Duration::from_secs(g.cooldown_seconds),
            max_user_chars: g.max_user_chars,
            max_context_chars: g.max_context_chars,
        },
        storage: StorageConfig {
            history_path: resolve_in(&work_dir, &raw.storage.history_file),
        },
        llm: LlmConfig {
            provider: raw.llm.provider,
            openai: OpenAiConfig {
                api_base_url: raw.llm.openai.api_base_url,
                model: raw.llm.openai.model,
                temperature: raw.llm.openai.temperature,
                timeout_seconds: raw.llm.openai.timeout_seconds,
                max_tokens: raw.llm.openai.max_tokens,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
        service_api_key: env::var("SERVICE_API_KEY").ok().filter(|k| !k.is_empty()),
        work_dir,
    })
}

fn parse_mode(section: &str, value: &str, local: &str, remote: &str) -> Result<StageMode, AppError> {
    match value {
        v if v == local => Ok(StageMode::Local),
        v if v == remote => Ok(StageMode::Remote),
        other => Err(AppError::Config(format!(
            "{section}.mode must be \"{local}\" or \"{remote}\", got \"{other}\""
        ))),
    }
}

/// Resolve `file` against `work_dir` unless it is already absolute.
fn resolve_in(work_dir: &Path, file: &str) -> PathBuf {
    let p = expand_home(file);
    if p.is_absolute() { p } else { work_dir.join(p) }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[service]
name = "test-assist"
work_dir = "/tmp/agri-test"
log_level = "info"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parse_minimal_config_uses_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), &Overrides::default()).unwrap();
        assert_eq!(cfg.service_name, "test-assist");
        assert_eq!(cfg.classifier.mode, StageMode::Local);
        assert_eq!(cfg.knowledge.mode, StageMode::Local);
        assert_eq!(cfg.generation.retries, 2);
        assert_eq!(cfg.generation.fail_threshold, 3);
        assert_eq!(cfg.generation.cooldown, Duration::from_secs(30));
        assert_eq!(cfg.generation.attempt_timeout, Duration::from_secs(20));
        assert_eq!(cfg.generation.max_user_chars, 1200);
        assert_eq!(cfg.llm.provider, "dummy");
    }

    #[test]
    fn storage_paths_resolve_against_work_dir() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), &Overrides::default()).unwrap();
        assert_eq!(cfg.storage.history_path, PathBuf::from("/tmp/agri-test/chat_history.db"));
        assert_eq!(cfg.knowledge.db_path, PathBuf::from("/tmp/agri-test/agri_knowledge.db"));
    }

    #[test]
    fn remote_modes_parse() {
        let f = write_toml(
            r#"
[classifier]
mode = "remote"
url = "http://nlu:9000/analyze"
[generation]
mode = "remote"
"#,
        );
        let cfg = load_from(f.path(), &Overrides::default()).unwrap();
        assert_eq!(cfg.classifier.mode, StageMode::Remote);
        assert_eq!(cfg.classifier.url, "http://nlu:9000/analyze");
        assert_eq!(cfg.generation.mode, StageMode::Remote);
    }

    #[test]
    fn unknown_mode_errors() {
        let f = write_toml("[knowledge]\nmode = \"postgres\"\n");
        let err = load_from(f.path(), &Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("knowledge.mode"));
    }

    #[test]
    fn zero_fail_threshold_rejected() {
        let f = write_toml("[generation]\nfail_threshold = 0\n");
        assert!(load_from(f.path(), &Overrides::default()).is_err());
    }

    #[test]
    fn oversized_retries_rejected() {
        let f = write_toml("[generation]\nretries = 4000000000\n");
        let err = load_from(f.path(), &Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("generation.retries"));

        let f = write_toml("[generation]\nretries = 10\n");
        assert_eq!(load_from(f.path(), &Overrides::default()).unwrap().generation.retries, 10);
    }

    #[test]
    fn oversized_cooldown_rejected() {
        let f = write_toml("[generation]\ncooldown_seconds = 86401\n");
        let err = load_from(f.path(), &Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("cooldown_seconds"));
    }

    #[test]
    fn overrides_win_over_file() {
        let f = write_toml(MINIMAL_TOML);
        let overrides = Overrides {
            work_dir: Some("/tmp/override".into()),
            log_level: Some("debug".into()),
            bind: Some("0.0.0.0:9999".into()),
        };
        let cfg = load_from(f.path(), &overrides).unwrap();
        assert_eq!(cfg.work_dir, PathBuf::from("/tmp/override"));
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.bind, "0.0.0.0:9999");
    }

    #[test]
    fn base_chain_merges_tables() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.toml");
        fs::write(&base, "[generation]\nretries = 5\ncooldown_seconds = 60\n").unwrap();
        let child = dir.path().join("child.toml");
        fs::write(&child, "[meta]\nbase = \"base.toml\"\n[generation]\nretries = 1\n").unwrap();

        let cfg = load_from(&child, &Overrides::default()).unwrap();
        assert_eq!(cfg.generation.retries, 1);
        assert_eq!(cfg.generation.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn circular_base_detected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.toml");
        let b = dir.path().join("b.toml");
        fs::write(&a, "[meta]\nbase = \"b.toml\"\n").unwrap();
        fs::write(&b, "[meta]\nbase = \"a.toml\"\n").unwrap();
        let err = load_from(&a, &Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("circular"));
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), &Overrides::default());
        assert!(result.unwrap_err().to_string().contains("config error"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/.agri-assist");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with(".agri-assist"));
    }

    #[test]
    fn absolute_path_unchanged() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }
}
