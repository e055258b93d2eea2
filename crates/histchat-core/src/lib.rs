//! Domain core for histchat: guest trial sessions, figures, prompt assembly
//! and the contracts of the external services they depend on.

pub mod completion;
pub mod config;
pub mod context;
pub mod error;
pub mod figure;
pub mod guest;
pub mod prompt;
pub mod safety;
pub mod thread;

// Re-export common error type
pub use error::HistchatError;
