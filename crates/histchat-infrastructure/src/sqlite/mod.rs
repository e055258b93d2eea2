//! SQLite-backed guest sessions and user threads.
//!
//! ## Tables
//!
//! - `guest_sessions` - One row per trial, unique `token`
//! - `guest_messages` - Transcript rows keyed by (session, sequence)
//! - `threads` / `thread_messages` - User-owned conversations
//!
//! All four tables live in one database so a migration can copy a
//! transcript and delete the guest rows in a single transaction.

mod guest;
pub mod schema;
mod threads;

use chrono::{DateTime, Utc};
use histchat_core::error::{HistchatError, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// SQLite store implementing `GuestSessionStore` and `ThreadRepository`.
///
/// The connection sits behind a mutex and every call runs on the blocking
/// pool, so async callers never hold the lock across an await.
#[derive(Clone)]
pub struct SqliteChatStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteChatStore {
    /// Open or create the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        info!("Opening SQLite database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )
        .map_err(db_err)?;

        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(db_err)?;

        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with exclusive access to the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| HistchatError::internal(format!("Lock poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| HistchatError::internal(format!("SQLite task failed: {}", e)))?
    }
}

pub(crate) fn db_err(err: rusqlite::Error) -> HistchatError {
    HistchatError::data_access(format!("SQLite: {}", err))
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| HistchatError::data_access(format!("Timestamp out of range: {}", ms)))
}
