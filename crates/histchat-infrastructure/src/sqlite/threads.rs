//! ThreadRepository over SQLite.

use super::guest::parse_role;
use super::{SqliteChatStore, db_err, from_millis};
use async_trait::async_trait;
use histchat_core::error::Result;
use histchat_core::thread::{Thread, ThreadId, ThreadMessage, ThreadRepository, UserId};
use rusqlite::{Connection, OptionalExtension};

type ThreadRow = (i64, i64, String, Option<String>, i64);

fn load_thread(conn: &Connection, row: ThreadRow) -> Result<Thread> {
    let (id, owner_id, title, figure_slug, created_at) = row;

    let mut stmt = conn
        .prepare(
            "SELECT position, user_id, role, content, model_used, created_at \
             FROM thread_messages WHERE thread_id = ?1 ORDER BY position",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map([id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;

    let messages = rows
        .into_iter()
        .map(|(position, user_id, role, content, model_used, created_at)| {
            Ok(ThreadMessage {
                position: position as u64,
                user_id: UserId(user_id),
                role: parse_role(&role)?,
                content,
                model_used,
                created_at: from_millis(created_at)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Thread {
        id: ThreadId(id),
        owner: UserId(owner_id),
        title,
        figure_slug,
        created_at: from_millis(created_at)?,
        messages,
    })
}

fn thread_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

#[async_trait]
impl ThreadRepository for SqliteChatStore {
    async fn find_thread(&self, id: ThreadId) -> Result<Option<Thread>> {
        self.with_conn(move |conn| {
            let conn: &Connection = conn;
            let row = conn
                .query_row(
                    "SELECT id, owner_id, title, figure_slug, created_at FROM threads WHERE id = ?1",
                    [id.0],
                    thread_row,
                )
                .optional()
                .map_err(db_err)?;
            row.map(|row| load_thread(conn, row)).transpose()
        })
        .await
    }

    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Thread>> {
        self.with_conn(move |conn| {
            let conn: &Connection = conn;
            let mut stmt = conn
                .prepare(
                    "SELECT id, owner_id, title, figure_slug, created_at FROM threads \
                     WHERE owner_id = ?1 ORDER BY id",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map([owner.0], thread_row)
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;

            rows.into_iter().map(|row| load_thread(conn, row)).collect()
        })
        .await
    }
}
