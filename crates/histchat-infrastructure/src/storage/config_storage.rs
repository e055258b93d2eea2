//! Application config loading.
//!
//! Layering: built-in defaults < `config.toml` < environment variables.

use super::atomic_toml::AtomicTomlFile;
use histchat_core::config::{AppConfig, LlmProvider};
use histchat_core::error::{HistchatError, Result};
use std::path::PathBuf;

/// Loads `AppConfig` from a TOML file plus environment overrides.
pub struct ConfigStorage {
    file: AtomicTomlFile<AppConfig>,
}

impl ConfigStorage {
    pub fn new(path: PathBuf) -> Self {
        Self {
            file: AtomicTomlFile::new(path),
        }
    }

    /// Config at the default location (`~/.config/histchat/config.toml`).
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(crate::paths::HistchatPaths::config_file()?))
    }

    /// Reads `.env` (if present) and the process environment, then loads.
    pub fn load(&self) -> Result<AppConfig> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!("Ignoring unreadable .env file: {}", err);
            }
        }
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Loads with an explicit environment lookup, then validates.
    pub fn load_with_env<F>(&self, env: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = self.file.load()?.unwrap_or_default();
        apply_env_overrides(&mut config, env)?;
        config.validate()?;

        tracing::debug!(
            "Loaded config from {} (max_questions={}, ttl={}m, provider={:?})",
            self.file.path().display(),
            config.guest.max_questions,
            config.guest.session_ttl_minutes,
            config.llm.provider
        );
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        self.file.save(config)
    }
}

fn apply_env_overrides<F>(config: &mut AppConfig, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env("GUEST_MAX_QUESTIONS") {
        config.guest.max_questions = parse_env("GUEST_MAX_QUESTIONS", &value)?;
    }
    if let Some(value) = env("GUEST_SESSION_TTL_MINUTES") {
        config.guest.session_ttl_minutes = parse_env("GUEST_SESSION_TTL_MINUTES", &value)?;
    }
    if let Some(value) = env("GUEST_COOKIE_SECURE") {
        config.guest.cookie.secure = parse_bool(&value);
    }
    if let Some(value) = env("GUEST_PROMPT_DEBUG").or_else(|| env("PROMPT_DEBUG")) {
        config.prompt.debug = parse_bool(&value);
    }
    if let Some(value) = env("RAG_ENABLED") {
        config.prompt.rag_enabled = parse_bool(&value);
    }
    if let Some(value) = env("LLM_PROVIDER") {
        config.llm.provider = LlmProvider::parse(&value)
            .ok_or_else(|| HistchatError::config(format!("Unknown LLM_PROVIDER '{value}'")))?;
    }
    if let Some(value) = env("LLM_MODEL") {
        config.llm.model = value;
    }
    if let Some(value) = env("OPENAI_API_BASE") {
        config.llm.api_base = Some(value);
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| HistchatError::config(format!("{key} has invalid value '{value}'")))
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ConfigStorage::new(temp_dir.path().join("config.toml"));
        let config = storage.load_with_env(env_of(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[guest]\nmax_questions = 5\nsession_ttl_minutes = 30\n",
        )
        .unwrap();

        let storage = ConfigStorage::new(path);
        let config = storage
            .load_with_env(env_of(&[
                ("GUEST_MAX_QUESTIONS", "7"),
                ("GUEST_COOKIE_SECURE", "false"),
                ("PROMPT_DEBUG", "true"),
                ("LLM_PROVIDER", "OpenRouter"),
            ]))
            .unwrap();

        assert_eq!(config.guest.max_questions, 7);
        assert_eq!(config.guest.session_ttl_minutes, 30);
        assert!(!config.guest.cookie.secure);
        assert!(config.prompt.debug);
        assert_eq!(config.llm.provider, LlmProvider::OpenRouter);
    }

    #[test]
    fn test_invalid_env_values_are_config_errors() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ConfigStorage::new(temp_dir.path().join("config.toml"));

        let err = storage
            .load_with_env(env_of(&[("GUEST_MAX_QUESTIONS", "three")]))
            .unwrap_err();
        assert!(matches!(err, HistchatError::Config(_)));

        let err = storage
            .load_with_env(env_of(&[("GUEST_MAX_QUESTIONS", "0")]))
            .unwrap_err();
        assert!(matches!(err, HistchatError::Config(_)));

        let err = storage
            .load_with_env(env_of(&[("LLM_PROVIDER", "acme")]))
            .unwrap_err();
        assert!(matches!(err, HistchatError::Config(_)));
    }

    #[test]
    fn test_oversized_ttl_env_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ConfigStorage::new(temp_dir.path().join("config.toml"));

        let err = storage
            .load_with_env(env_of(&[("GUEST_SESSION_TTL_MINUTES", "10000000000000")]))
            .unwrap_err();
        assert!(matches!(err, HistchatError::Config(_)));

        let config = storage
            .load_with_env(env_of(&[("GUEST_SESSION_TTL_MINUTES", "525600")]))
            .unwrap();
        assert_eq!(config.guest.session_ttl_minutes, 525_600);
    }

    #[test]
    fn test_save_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let storage = ConfigStorage::new(temp_dir.path().join("config.toml"));
        let mut config = AppConfig::default();
        config.guest.max_questions = 9;
        storage.save(&config).unwrap();

        let loaded = storage.load_with_env(env_of(&[])).unwrap();
        assert_eq!(loaded.guest.max_questions, 9);
    }
}
