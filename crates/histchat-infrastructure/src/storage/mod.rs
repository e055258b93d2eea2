//! File-backed storage: atomic TOML documents, config and secrets.

mod atomic_toml;
mod config_storage;
mod secret_storage;

pub use atomic_toml::AtomicTomlFile;
pub use config_storage::ConfigStorage;
pub use secret_storage::SecretStorage;
