//! User-owned conversation threads.
//!
//! # Module Structure
//!
//! - `model`: `Thread`, `ThreadMessage`, `ThreadDraft`, `MigrationReceipt`
//! - `repository`: `ThreadRepository` trait for reading threads back

mod model;
mod repository;

pub use model::{MigrationReceipt, Thread, ThreadDraft, ThreadId, ThreadMessage, UserId};
pub use repository::ThreadRepository;
