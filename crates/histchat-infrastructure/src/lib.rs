pub mod memory;
pub mod paths;
pub mod sqlite;
pub mod storage;
pub mod toml_figure_catalog;

pub use crate::memory::{KeywordContextStore, MemoryChatStore, MemoryFigureCatalog};
pub use crate::paths::HistchatPaths;
pub use crate::sqlite::SqliteChatStore;
pub use crate::storage::{AtomicTomlFile, ConfigStorage, SecretStorage};
pub use crate::toml_figure_catalog::TomlFigureCatalog;
