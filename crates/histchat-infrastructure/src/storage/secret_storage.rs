//! Secret configuration file storage.
//!
//! Loads API keys from `~/.config/histchat/secret.json`, falling back to
//! environment variables.

use crate::paths::HistchatPaths;
use histchat_core::config::{LlmProvider, SecretConfig};
use histchat_core::error::{HistchatError, Result};
use std::fs;
use std::path::PathBuf;

/// Read-only storage for `secret.json`.
///
/// Does NOT write, validate, or encrypt keys. The file should be mode 600.
pub struct SecretStorage {
    path: PathBuf,
}

impl SecretStorage {
    /// Creates a SecretStorage at the default path.
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: HistchatPaths::secret_file()?,
        })
    }

    /// Creates a SecretStorage with a custom path (for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the secret configuration.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(SecretConfig))`: Loaded and parsed
    /// - `Ok(None)`: File doesn't exist
    /// - `Err`: Unreadable or invalid JSON
    pub fn load(&self) -> Result<Option<SecretConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Resolves the API key for `provider`.
    ///
    /// Priority: `secret.json`, then `OPENAI_API_KEY` / `OPENROUTER_API_KEY`.
    pub fn resolve_api_key(&self, provider: LlmProvider) -> Result<String> {
        self.resolve_api_key_with_env(provider, |key| std::env::var(key).ok())
    }

    pub fn resolve_api_key_with_env<F>(&self, provider: LlmProvider, env: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secrets) = self.load()? {
            if let Some(key) = secrets.api_key_for(provider) {
                return Ok(key.to_string());
            }
        }

        let var = match provider {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
        };
        env(var)
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                HistchatError::config(format!(
                    "{var} not found in {} or environment variables",
                    self.path.display()
                ))
            })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
