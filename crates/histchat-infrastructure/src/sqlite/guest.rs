//! GuestSessionStore over SQLite.

use super::{SqliteChatStore, db_err, from_millis, to_millis};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use histchat_core::error::{HistchatError, Result};
use histchat_core::guest::{
    GuestMessage, GuestSession, GuestSessionStore, MessageRole, NewGuestMessage, SessionToken,
};
use histchat_core::thread::{MigrationReceipt, ThreadDraft, ThreadId};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

const SESSION_COLUMNS: &str = "token, figure_slug, created_at, expires_at, question_count, \
                               max_questions, revoked";

struct SessionRow {
    token: String,
    figure_slug: String,
    created_at: i64,
    expires_at: i64,
    question_count: u32,
    max_questions: u32,
    revoked: bool,
}

impl SessionRow {
    fn into_session(self) -> Result<GuestSession> {
        let token = SessionToken::parse(&self.token)
            .ok_or_else(|| HistchatError::data_access("Malformed guest token in database"))?;
        Ok(GuestSession {
            token,
            figure_slug: self.figure_slug,
            created_at: from_millis(self.created_at)?,
            expires_at: from_millis(self.expires_at)?,
            question_count: self.question_count,
            max_questions: self.max_questions,
            revoked: self.revoked,
        })
    }
}

fn load_session(conn: &Connection, token: &str) -> Result<Option<GuestSession>> {
    let row = conn
        .query_row(
            &format!("SELECT {SESSION_COLUMNS} FROM guest_sessions WHERE token = ?1"),
            [token],
            |row| {
                Ok(SessionRow {
                    token: row.get(0)?,
                    figure_slug: row.get(1)?,
                    created_at: row.get(2)?,
                    expires_at: row.get(3)?,
                    question_count: row.get(4)?,
                    max_questions: row.get(5)?,
                    revoked: row.get(6)?,
                })
            },
        )
        .optional()
        .map_err(db_err)?;

    row.map(SessionRow::into_session).transpose()
}

pub(super) fn parse_role(raw: &str) -> Result<MessageRole> {
    MessageRole::parse(raw)
        .ok_or_else(|| HistchatError::data_access(format!("Unknown message role '{}'", raw)))
}

fn load_transcript(conn: &Connection, session_id: i64) -> Result<Vec<GuestMessage>> {
    let mut stmt = conn
        .prepare(
            "SELECT sequence, role, content, model_used, created_at FROM guest_messages \
             WHERE session_id = ?1 ORDER BY sequence",
        )
        .map_err(db_err)?;

    let rows = stmt
        .query_map([session_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })
        .map_err(db_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(db_err)?;

    rows.into_iter()
        .map(|(sequence, role, content, model_used, created_at)| {
            Ok(GuestMessage {
                sequence: sequence as u64,
                role: parse_role(&role)?,
                content,
                model_used,
                created_at: from_millis(created_at)?,
            })
        })
        .collect()
}

#[async_trait]
impl GuestSessionStore for SqliteChatStore {
    async fn insert_session(&self, session: &GuestSession) -> Result<()> {
        let session = session.clone();
        self.with_conn(move |conn| {
            conn.execute(
                &format!("INSERT INTO guest_sessions ({SESSION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![
                    session.token.as_str(),
                    session.figure_slug,
                    to_millis(session.created_at),
                    to_millis(session.expires_at),
                    session.question_count,
                    session.max_questions,
                    session.revoked,
                ],
            )
            .map_err(db_err)?;
            Ok(())
        })
        .await
    }

    async fn find_session(&self, token: &SessionToken) -> Result<Option<GuestSession>> {
        let token = token.as_str().to_string();
        self.with_conn(move |conn| load_session(conn, &token)).await
    }

    async fn consume_question(
        &self,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<GuestSession> {
        let token = token.as_str().to_string();
        self.with_conn(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE guest_sessions SET question_count = question_count + 1 \
                     WHERE token = ?1 AND revoked = 0 AND expires_at > ?2 \
                     AND question_count < max_questions",
                    params![token, to_millis(now)],
                )
                .map_err(db_err)?;

            let session = load_session(conn, &token)?.ok_or(HistchatError::InvalidSession)?;
            if updated == 1 {
                return Ok(session);
            }

            // Nothing changed: classify why
            session.check_ask(now)?;
            Err(HistchatError::internal(
                "Conditional update rejected an active guest session",
            ))
        })
        .await
    }

    async fn append_message(
        &self,
        token: &SessionToken,
        message: NewGuestMessage,
        now: DateTime<Utc>,
    ) -> Result<GuestMessage> {
        let token = token.as_str().to_string();
        self.with_conn(move |conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(db_err)?;

            let (session_id, revoked): (i64, bool) = tx
                .query_row(
                    "SELECT id, revoked FROM guest_sessions WHERE token = ?1",
                    [&token],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
                .map_err(db_err)?
                .ok_or(HistchatError::InvalidSession)?;
            if revoked {
                return Err(HistchatError::InvalidSession);
            }

            let sequence: i64 = tx
                .query_row(
                    "SELECT COALESCE(MAX(sequence) + 1, 0) FROM guest_messages WHERE session_id = ?1",
                    [session_id],
                    |row| row.get(0),
                )
                .map_err(db_err)?;

            tx.execute(
                "INSERT INTO guest_messages (session_id, sequence, role, content, model_used, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session_id,
                    sequence,
                    message.role.as_str(),
                    message.content,
                    message.model_used,
                    to_millis(now),
                ],
            )
            .map_err(db_err)?;
            tx.commit().map_err(db_err)?;

            Ok(GuestMessage {
                sequence: sequence as u64,
                role: message.role,
                content: message.content,
                model_used: message.model_used,
                created_at: now,
            })
        })
        .await
    }

    async fn transcript(&self, token: &SessionToken) -> Result<Vec<GuestMessage>> {
        let token = token.as_str().to_string();
        self.with_conn(move |conn| {
            let session_id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM guest_sessions WHERE token = ?1",
                    [&token],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            match session_id {
                Some(id) => load_transcript(conn, id),
                None => Ok(Vec::new()),
            }
        })
        .await
    }

    async fn migrate(&self, token: &SessionToken, draft: &ThreadDraft) -> Result<MigrationReceipt> {
        let redacted = token.redacted();
        let token = token.as_str().to_string();
        let draft = draft.clone();

        let receipt = self
            .with_conn(move |conn| {
                let tx = conn
                    .transaction_with_behavior(TransactionBehavior::Immediate)
                    .map_err(db_err)?;

                let (session_id, revoked): (i64, bool) = tx
                    .query_row(
                        "SELECT id, revoked FROM guest_sessions WHERE token = ?1",
                        [&token],
                        |row| Ok((row.get(0)?, row.get(1)?)),
                    )
                    .optional()
                    .map_err(db_err)?
                    .ok_or(HistchatError::InvalidSession)?;
                if revoked {
                    return Err(HistchatError::MigrationConflict);
                }

                tx.execute(
                    "UPDATE guest_sessions SET revoked = 1 WHERE id = ?1",
                    [session_id],
                )
                .map_err(db_err)?;

                let messages = load_transcript(&tx, session_id)?;
                let now = Utc::now();

                tx.execute(
                    "INSERT INTO threads (owner_id, title, figure_slug, created_at) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![draft.owner.0, draft.title, draft.figure_slug, to_millis(now)],
                )
                .map_err(db_err)?;
                let thread_id = tx.last_insert_rowid();

                for (position, message) in messages.iter().enumerate() {
                    tx.execute(
                        "INSERT INTO thread_messages \
                         (thread_id, position, user_id, role, content, model_used, created_at) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                        params![
                            thread_id,
                            position as i64,
                            draft.owner.0,
                            message.role.as_str(),
                            message.content,
                            message.model_used,
                            to_millis(message.created_at),
                        ],
                    )
                    .map_err(db_err)?;
                }

                tx.execute("DELETE FROM guest_messages WHERE session_id = ?1", [session_id])
                    .map_err(db_err)?;
                tx.execute("DELETE FROM guest_sessions WHERE id = ?1", [session_id])
                    .map_err(db_err)?;
                tx.commit().map_err(db_err)?;

                Ok(MigrationReceipt {
                    thread_id: ThreadId(thread_id),
                    transferred_messages: messages.len(),
                })
            })
            .await?;

        debug!(
            "Migrated guest session {} into thread {} ({} messages)",
            redacted, receipt.thread_id, receipt.transferred_messages
        );
        Ok(receipt)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(db_err)?;
            let cutoff = to_millis(now);
            tx.execute(
                "DELETE FROM guest_messages WHERE session_id IN \
                 (SELECT id FROM guest_sessions WHERE expires_at <= ?1)",
                [cutoff],
            )
            .map_err(db_err)?;
            let removed = tx
                .execute("DELETE FROM guest_sessions WHERE expires_at <= ?1", [cutoff])
                .map_err(db_err)?;
            tx.commit().map_err(db_err)?;
            Ok(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use histchat_core::thread::{ThreadRepository, UserId};

    async fn store_with_session(max: u32, created: DateTime<Utc>) -> (SqliteChatStore, GuestSession) {
        let store = SqliteChatStore::open_in_memory().unwrap();
        let session = GuestSession::new(
            SessionToken::generate(),
            "cleopatra",
            created,
            Duration::minutes(120),
            max,
        )
        .unwrap();
        store.insert_session(&session).await.unwrap();
        (store, session)
    }

    #[tokio::test]
    async fn test_conditional_update_stops_at_max() {
        let now = Utc::now();
        let (store, session) = store_with_session(2, now).await;

        let first = store.consume_question(&session.token, now).await.unwrap();
        assert_eq!(first.remaining_questions(), 1);
        let second = store.consume_question(&session.token, now).await.unwrap();
        assert_eq!(second.remaining_questions(), 0);

        let err = store.consume_question(&session.token, now).await.unwrap_err();
        assert!(matches!(err, HistchatError::QuotaExceeded { max_questions: 2, .. }));

        let stored = store.find_session(&session.token).await.unwrap().unwrap();
        assert_eq!(stored.question_count, 2);
    }

    #[tokio::test]
    async fn test_consume_classifies_expired_and_unknown() {
        let now = Utc::now();
        let (store, session) = store_with_session(3, now - Duration::hours(3)).await;

        let err = store.consume_question(&session.token, now).await.unwrap_err();
        assert!(matches!(err, HistchatError::SessionExpired { .. }));

        let err = store
            .consume_question(&SessionToken::generate(), now)
            .await
            .unwrap_err();
        assert_eq!(err, HistchatError::InvalidSession);
    }

    #[tokio::test]
    async fn test_migration_is_transactional_and_single_shot() {
        let now = Utc::now();
        let (store, session) = store_with_session(3, now).await;
        for text in ["q1", "a1", "q2"] {
            let message = if text.starts_with('q') {
                NewGuestMessage::user(text, None)
            } else {
                NewGuestMessage::assistant(text, Some("gpt-4o-mini".into()))
            };
            store.append_message(&session.token, message, now).await.unwrap();
        }

        let draft = ThreadDraft::for_guest_transcript(UserId(42), "cleopatra");
        let receipt = store.migrate(&session.token, &draft).await.unwrap();
        assert_eq!(receipt.transferred_messages, 3);

        let thread = store.find_thread(receipt.thread_id).await.unwrap().unwrap();
        let contents: Vec<_> = thread.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2"]);
        assert!(thread.messages.iter().all(|m| m.user_id == UserId(42)));
        assert_eq!(thread.title, "Guest chat with cleopatra");

        assert_eq!(
            store.migrate(&session.token, &draft).await.unwrap_err(),
            HistchatError::InvalidSession
        );
        assert!(store.transcript(&session.token).await.unwrap().is_empty());
        assert_eq!(store.list_for_owner(UserId(42)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_after_migration_is_invalid() {
        let now = Utc::now();
        let (store, session) = store_with_session(3, now).await;
        let draft = ThreadDraft::for_guest_transcript(UserId(1), "cleopatra");
        let receipt = store.migrate(&session.token, &draft).await.unwrap();
        assert_eq!(receipt.transferred_messages, 0);

        let err = store
            .append_message(&session.token, NewGuestMessage::user("late", None), now)
            .await
            .unwrap_err();
        assert_eq!(err, HistchatError::InvalidSession);
    }

    #[tokio::test]
    async fn test_purge_expired_removes_transcripts() {
        let now = Utc::now();
        let (store, stale) = store_with_session(3, now - Duration::hours(3)).await;
        store
            .append_message(&stale.token, NewGuestMessage::user("old", None), now)
            .await
            .unwrap();

        assert_eq!(store.purge_expired(now).await.unwrap(), 1);
        assert!(store.find_session(&stale.token).await.unwrap().is_none());
        assert_eq!(store.purge_expired(now).await.unwrap(), 0);
    }
}
