//! Database schema definitions

use histchat_core::error::Result;
use rusqlite::Connection;
use tracing::info;

use super::db_err;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(GUEST_SCHEMA).map_err(db_err)?;
        conn.execute_batch(THREAD_SCHEMA).map_err(db_err)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!(
            "Migrating schema from v{} to v{}",
            current_version, SCHEMA_VERSION
        );
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(db_err)?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .unwrap_or(0);

    Ok(version)
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(db_err)?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(db_err)?;
    Ok(())
}

/// Guest sessions keyed by a unique token; transcripts keyed by
/// (session, sequence). Timestamps are unix milliseconds.
const GUEST_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS guest_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    token TEXT NOT NULL UNIQUE,
    figure_slug TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    question_count INTEGER NOT NULL DEFAULT 0,
    max_questions INTEGER NOT NULL,
    revoked INTEGER NOT NULL DEFAULT 0,
    CHECK (question_count <= max_questions)
);

CREATE INDEX IF NOT EXISTS idx_guest_sessions_expires_at ON guest_sessions(expires_at);

CREATE TABLE IF NOT EXISTS guest_messages (
    session_id INTEGER NOT NULL REFERENCES guest_sessions(id) ON DELETE CASCADE,
    sequence INTEGER NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    model_used TEXT,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (session_id, sequence)
);
"#;

const THREAD_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS threads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    figure_slug TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_threads_owner ON threads(owner_id);

CREATE TABLE IF NOT EXISTS thread_messages (
    thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    model_used TEXT,
    created_at INTEGER NOT NULL,
    PRIMARY KEY (thread_id, position)
);
"#;
