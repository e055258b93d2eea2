//! Thread repository trait.

use super::model::{Thread, ThreadId, UserId};
use crate::error::Result;
use async_trait::async_trait;

/// Read access to user-owned threads.
///
/// Threads are written only through `GuestSessionStore::migrate`, which must
/// share a transactional boundary with the guest tables.
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// Finds a thread with its messages in position order.
    async fn find_thread(&self, id: ThreadId) -> Result<Option<Thread>>;

    /// Lists an owner's threads, oldest first.
    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Thread>>;
}
