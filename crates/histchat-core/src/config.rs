//! Configuration model.
//!
//! Every field has a default so that an empty `config.toml` is valid. Loading
//! from disk and environment lives in `histchat-infrastructure`.

use crate::error::{HistchatError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub guest: GuestConfig,
    pub prompt: PromptConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Rejects configurations that would make the guest trial unusable.
    pub fn validate(&self) -> Result<()> {
        if self.guest.max_questions == 0 {
            return Err(HistchatError::config("guest.max_questions must be at least 1"));
        }
        if self.guest.session_ttl_minutes <= 0 {
            return Err(HistchatError::config(
                "guest.session_ttl_minutes must be a positive integer",
            ));
        }
        if self.guest.session_ttl_minutes > MAX_SESSION_TTL_MINUTES {
            return Err(HistchatError::config(format!(
                "guest.session_ttl_minutes must be at most {MAX_SESSION_TTL_MINUTES} (one year)"
            )));
        }
        if let Some(limit) = &self.guest.start_limit {
            if limit.max_starts == 0 || limit.window_seconds == 0 {
                return Err(HistchatError::config(
                    "guest.start_limit needs non-zero max_starts and window_seconds",
                ));
            }
        }
        if self.prompt.context_budget_chars == 0 {
            return Err(HistchatError::config("prompt.context_budget_chars must be positive"));
        }
        if self.llm.timeout_secs == 0 {
            return Err(HistchatError::config("llm.timeout_secs must be positive"));
        }
        if self.llm.model.trim().is_empty() {
            return Err(HistchatError::config("llm.model must not be empty"));
        }
        Ok(())
    }
}

/// Upper bound on `guest.session_ttl_minutes` (one year).
pub const MAX_SESSION_TTL_MINUTES: i64 = 365 * 24 * 60;

/// Guest trial limits.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GuestConfig {
    pub max_questions: u32,
    pub session_ttl_minutes: i64,
    /// Enables age-profile message filtering
    pub safety_enabled: bool,
    pub cookie: CookieConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_limit: Option<StartLimitConfig>,
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self {
            max_questions: 3,
            session_ttl_minutes: 120,
            safety_enabled: false,
            cookie: CookieConfig::default(),
            start_limit: None,
        }
    }
}

impl GuestConfig {
    /// Session lifetime; fails for values `chrono` cannot represent.
    pub fn ttl(&self) -> Result<chrono::Duration> {
        chrono::Duration::try_minutes(self.session_ttl_minutes).ok_or_else(|| {
            HistchatError::config(format!(
                "guest.session_ttl_minutes {} is out of range",
                self.session_ttl_minutes
            ))
        })
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes of the guest session cookie.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "guest_session".to_string(),
            secure: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
        }
    }
}

/// Sliding-window limit on guest session starts per client.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartLimitConfig {
    pub max_starts: u32,
    pub window_seconds: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    pub context_budget_chars: usize,
    pub retrieval_top_k: usize,
    pub rag_enabled: bool,
    pub retrieval_timeout_ms: u64,
    /// Logs assembled prompts at debug level
    pub debug: bool,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            context_budget_chars: 4000,
            retrieval_top_k: 5,
            rag_enabled: true,
            retrieval_timeout_ms: 3000,
            debug: false,
        }
    }
}

/// Supported completion providers.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    OpenRouter,
}

impl LlmProvider {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "openrouter" => Some(Self::OpenRouter),
            _ => None,
        }
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            temperature: 0.2,
            top_p: None,
            max_tokens: None,
            timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or_else(|| self.provider.default_api_base())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Defaults to `<data dir>/histchat.db`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
    /// Defaults to `<config dir>/figures.toml`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub figures_path: Option<PathBuf>,
}

/// API keys, kept out of `config.toml`.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SecretConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<ApiKeyConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openrouter: Option<ApiKeyConfig>,
}

impl SecretConfig {
    pub fn api_key_for(&self, provider: LlmProvider) -> Option<&str> {
        let entry = match provider {
            LlmProvider::OpenAi => self.openai.as_ref(),
            LlmProvider::OpenRouter => self.openrouter.as_ref(),
        };
        entry
            .map(|c| c.api_key.as_str())
            .filter(|key| !key.trim().is_empty())
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ApiKeyConfig {
    pub api_key: String,
}
