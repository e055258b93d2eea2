//! Guest-to-user upgrade.

use histchat_core::config::CookieConfig;
use histchat_core::error::{HistchatError, Result};
use histchat_core::guest::{GuestCookie, GuestSessionStore, SessionToken};
use histchat_core::thread::{ThreadDraft, ThreadId, UserId};
use serde::Serialize;
use std::sync::Arc;

/// Result of `Upgrade`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpgradeOutcome {
    pub thread_id: ThreadId,
    pub transferred_messages: usize,
    /// `Set-Cookie` header value that removes the guest cookie
    #[serde(skip)]
    pub clear_cookie: String,
}

/// Moves a guest transcript into a new user-owned thread and retires the
/// guest session.
///
/// The copy and the deletion happen inside `GuestSessionStore::migrate`,
/// which owns the transactional boundary. A token can be upgraded at most
/// once; replays fail with `InvalidSession`.
pub struct MigrationCoordinator {
    store: Arc<dyn GuestSessionStore>,
    cookie: CookieConfig,
}

impl MigrationCoordinator {
    pub fn new(store: Arc<dyn GuestSessionStore>, cookie: CookieConfig) -> Self {
        Self { store, cookie }
    }

    /// Upgrades the guest session behind `token` into a thread owned by
    /// `user_id`.
    ///
    /// Exhausted and expired sessions can still be upgraded as long as they
    /// have not been purged. An empty transcript yields an empty thread.
    pub async fn upgrade(&self, token: &SessionToken, user_id: UserId) -> Result<UpgradeOutcome> {
        let session = self
            .store
            .find_session(token)
            .await?
            .ok_or(HistchatError::InvalidSession)?;
        if session.revoked {
            return Err(HistchatError::MigrationConflict);
        }

        let draft = ThreadDraft::for_guest_transcript(user_id, &session.figure_slug);
        let receipt = self.store.migrate(token, &draft).await.inspect_err(|err| {
            tracing::warn!(
                "Migration of guest session {} failed: {}",
                token.redacted(),
                err
            );
        })?;

        tracing::info!(
            "Upgraded guest session {} into thread {} for user {} ({} messages)",
            token.redacted(),
            receipt.thread_id,
            user_id,
            receipt.transferred_messages
        );

        Ok(UpgradeOutcome {
            thread_id: receipt.thread_id,
            transferred_messages: receipt.transferred_messages,
            clear_cookie: GuestCookie::new(&self.cookie).clear(),
        })
    }
}
