//! Guest session store trait.

use super::model::{GuestMessage, GuestSession, NewGuestMessage};
use super::token::SessionToken;
use crate::error::Result;
use crate::thread::{MigrationReceipt, ThreadDraft};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable record of guest sessions and their transcripts.
///
/// This is the only component that mutates quota or expiry state.
///
/// # Implementation Notes
///
/// - `consume_question` must be a single atomic check-and-increment: a
///   per-session lock held only for the counter mutation, or a conditional
///   `UPDATE ... WHERE question_count < max_questions` with an affected-rows
///   check. Read-then-write in application code is not acceptable.
/// - `migrate` writes the destination thread in the same transactional
///   boundary that deletes the guest rows, so implementations own the
///   thread tables too (see `ThreadRepository`).
#[async_trait]
pub trait GuestSessionStore: Send + Sync {
    /// Persists a freshly created session. Tokens are unique.
    async fn insert_session(&self, session: &GuestSession) -> Result<()>;

    /// Finds a session by token, including revoked ones.
    async fn find_session(&self, token: &SessionToken) -> Result<Option<GuestSession>>;

    /// Atomically checks that the session may ask at `now` and increments
    /// its counter.
    ///
    /// # Returns
    ///
    /// - `Ok(GuestSession)`: the session after the increment
    /// - `Err(InvalidSession)`: unknown or revoked token
    /// - `Err(SessionExpired)` / `Err(QuotaExceeded)`: policy boundary
    async fn consume_question(
        &self,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<GuestSession>;

    /// Appends a transcript entry with the next sequence number.
    ///
    /// Fails with `InvalidSession` if the session is unknown or revoked.
    async fn append_message(
        &self,
        token: &SessionToken,
        message: NewGuestMessage,
        now: DateTime<Utc>,
    ) -> Result<GuestMessage>;

    /// Returns the transcript in sequence order.
    async fn transcript(&self, token: &SessionToken) -> Result<Vec<GuestMessage>>;

    /// Moves the transcript into a new thread and deletes the guest rows as
    /// one atomic unit.
    ///
    /// # Returns
    ///
    /// - `Ok(MigrationReceipt)`: thread created, session gone
    /// - `Err(InvalidSession)`: unknown (or already migrated) token
    /// - `Err(MigrationConflict)`: another migration holds the session
    async fn migrate(
        &self,
        token: &SessionToken,
        draft: &ThreadDraft,
    ) -> Result<MigrationReceipt>;

    /// Deletes sessions (and transcripts) expired at `now`.
    ///
    /// Returns the number of sessions removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}
