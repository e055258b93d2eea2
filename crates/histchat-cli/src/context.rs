//! Wiring of config, storage and services for CLI commands.

use anyhow::{Context, Result};
use histchat_application::{GuestSessionManager, MigrationCoordinator};
use async_trait::async_trait;
use histchat_core::completion::{Completion, CompletionRequest, CompletionService};
use histchat_core::config::{AppConfig, StorageBackend};
use histchat_core::context::ContextStore;
use histchat_core::figure::FigureCatalog;
use histchat_core::error::HistchatError;
use histchat_core::guest::GuestSessionStore;
use histchat_core::thread::ThreadRepository;
use histchat_infrastructure::{
    ConfigStorage, HistchatPaths, KeywordContextStore, MemoryChatStore, SecretStorage,
    SqliteChatStore, TomlFigureCatalog,
};
use histchat_interaction::OpenAiCompletionClient;
use std::path::PathBuf;
use std::sync::Arc;

pub struct CliContext {
    pub config: AppConfig,
    pub catalog: Arc<TomlFigureCatalog>,
    sessions: Arc<dyn GuestSessionStore>,
    threads: Arc<dyn ThreadRepository>,
}

impl CliContext {
    /// Loads config and opens the configured storage backend.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let storage = match config_path {
            Some(path) => ConfigStorage::new(path),
            None => ConfigStorage::default_location()?,
        };
        let config = storage.load().context("Failed to load configuration")?;

        let catalog = Arc::new(match &config.storage.figures_path {
            Some(path) => TomlFigureCatalog::with_path(path.clone()),
            None => TomlFigureCatalog::new()?,
        });

        let (sessions, threads): (Arc<dyn GuestSessionStore>, Arc<dyn ThreadRepository>) =
            match config.storage.backend {
                StorageBackend::Sqlite => {
                    let path = match &config.storage.sqlite_path {
                        Some(path) => path.clone(),
                        None => HistchatPaths::database_file()?,
                    };
                    let store = Arc::new(SqliteChatStore::open(&path).with_context(|| {
                        format!("Failed to open database at {}", path.display())
                    })?);
                    tracing::debug!("Using SQLite store at {}", path.display());
                    let sessions: Arc<dyn GuestSessionStore> = store.clone();
                    (sessions, store as Arc<dyn ThreadRepository>)
                }
                StorageBackend::Memory => {
                    tracing::warn!("Using in-memory store; sessions end with this process");
                    let store = Arc::new(MemoryChatStore::new());
                    let sessions: Arc<dyn GuestSessionStore> = store.clone();
                    (sessions, store as Arc<dyn ThreadRepository>)
                }
            };

        Ok(Self {
            config,
            catalog,
            sessions,
            threads,
        })
    }

    pub fn threads(&self) -> Arc<dyn ThreadRepository> {
        self.threads.clone()
    }

    /// Builds the session manager; requires an API key.
    pub async fn session_manager(&self) -> Result<GuestSessionManager> {
        let completion: Arc<dyn CompletionService> = Arc::new(
            OpenAiCompletionClient::from_config(&self.config.llm, &SecretStorage::new()?)
                .context("Failed to configure completion client")?,
        );

        let context_store: Option<Arc<dyn ContextStore>> = if self.config.prompt.rag_enabled {
            let figures = self.catalog.list_all().await?;
            Some(Arc::new(KeywordContextStore::from_figures(&figures)?))
        } else {
            None
        };

        Ok(GuestSessionManager::new(
            self.sessions.clone(),
            self.catalog.clone(),
            completion,
            context_store,
            &self.config,
        ))
    }

    /// Session manager for commands that never reach the model.
    pub fn offline_manager(&self) -> GuestSessionManager {
        GuestSessionManager::new(
            self.sessions.clone(),
            self.catalog.clone(),
            Arc::new(Unconfigured),
            None,
            &self.config,
        )
    }

    pub fn migration_coordinator(&self) -> MigrationCoordinator {
        MigrationCoordinator::new(self.sessions.clone(), self.config.guest.cookie.clone())
    }
}

/// Stand-in for commands that never reach the model (`status`, `purge`).
struct Unconfigured;

#[async_trait]
impl CompletionService for Unconfigured {
    async fn generate(&self, _request: &CompletionRequest) -> histchat_core::error::Result<Completion> {
        Err(HistchatError::upstream("completion", "not configured for this command"))
    }
}
