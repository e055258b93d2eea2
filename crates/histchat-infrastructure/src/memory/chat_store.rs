//! In-memory guest session and thread store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use histchat_core::error::{HistchatError, Result};
use histchat_core::guest::{
    GuestMessage, GuestSession, GuestSessionStore, NewGuestMessage, SessionToken,
};
use histchat_core::thread::{
    MigrationReceipt, Thread, ThreadDraft, ThreadId, ThreadMessage, ThreadRepository, UserId,
};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

struct SessionRecord {
    session: GuestSession,
    messages: Vec<GuestMessage>,
}

/// A sharded map of sessions, each guarded by its own lock.
///
/// The per-session lock is held only for local mutations (counter, append,
/// migration), never across an await point.
pub struct MemoryChatStore {
    sessions: DashMap<String, Arc<Mutex<SessionRecord>>>,
    threads: DashMap<ThreadId, Thread>,
    next_thread_id: AtomicI64,
}

impl Default for MemoryChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            threads: DashMap::new(),
            next_thread_id: AtomicI64::new(1),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn record(&self, token: &SessionToken) -> Option<Arc<Mutex<SessionRecord>>> {
        // Clone the Arc so the shard guard is released before locking
        self.sessions
            .get(token.as_str())
            .map(|entry| Arc::clone(entry.value()))
    }
}

fn lock(record: &Mutex<SessionRecord>) -> Result<MutexGuard<'_, SessionRecord>> {
    record
        .lock()
        .map_err(|_| HistchatError::internal("guest session lock poisoned"))
}

#[async_trait]
impl GuestSessionStore for MemoryChatStore {
    async fn insert_session(&self, session: &GuestSession) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.sessions.entry(session.token.as_str().to_string()) {
            Entry::Occupied(_) => Err(HistchatError::data_access(format!(
                "duplicate guest token {}",
                session.token.redacted()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(SessionRecord {
                    session: session.clone(),
                    messages: Vec::new(),
                })));
                Ok(())
            }
        }
    }

    async fn find_session(&self, token: &SessionToken) -> Result<Option<GuestSession>> {
        let Some(record) = self.record(token) else {
            return Ok(None);
        };
        let session = lock(&record)?.session.clone();
        Ok(Some(session))
    }

    async fn consume_question(
        &self,
        token: &SessionToken,
        now: DateTime<Utc>,
    ) -> Result<GuestSession> {
        let record = self.record(token).ok_or(HistchatError::InvalidSession)?;
        let mut guard = lock(&record)?;
        guard.session.consume_question(now)?;
        Ok(guard.session.clone())
    }

    async fn append_message(
        &self,
        token: &SessionToken,
        message: NewGuestMessage,
        now: DateTime<Utc>,
    ) -> Result<GuestMessage> {
        let record = self.record(token).ok_or(HistchatError::InvalidSession)?;
        let mut guard = lock(&record)?;
        if guard.session.revoked {
            return Err(HistchatError::InvalidSession);
        }

        let stored = GuestMessage {
            sequence: guard.messages.last().map_or(0, |m| m.sequence + 1),
            role: message.role,
            content: message.content,
            model_used: message.model_used,
            created_at: now,
        };
        guard.messages.push(stored.clone());
        Ok(stored)
    }

    async fn transcript(&self, token: &SessionToken) -> Result<Vec<GuestMessage>> {
        let Some(record) = self.record(token) else {
            return Ok(Vec::new());
        };
        let messages = lock(&record)?.messages.clone();
        Ok(messages)
    }

    async fn migrate(&self, token: &SessionToken, draft: &ThreadDraft) -> Result<MigrationReceipt> {
        let record = self.record(token).ok_or(HistchatError::InvalidSession)?;
        let receipt = {
            let mut guard = lock(&record)?;
            if guard.session.revoked {
                return Err(HistchatError::MigrationConflict);
            }
            guard.session.revoked = true;

            let created_at = Utc::now();
            let messages: Vec<ThreadMessage> = std::mem::take(&mut guard.messages)
                .into_iter()
                .enumerate()
                .map(|(position, message)| ThreadMessage {
                    position: position as u64,
                    user_id: draft.owner,
                    role: message.role,
                    content: message.content,
                    model_used: message.model_used,
                    created_at: message.created_at,
                })
                .collect();

            let thread_id = ThreadId(self.next_thread_id.fetch_add(1, Ordering::SeqCst));
            let transferred_messages = messages.len();
            self.threads.insert(
                thread_id,
                Thread {
                    id: thread_id,
                    owner: draft.owner,
                    title: draft.title.clone(),
                    figure_slug: draft.figure_slug.clone(),
                    created_at,
                    messages,
                },
            );

            MigrationReceipt {
                thread_id,
                transferred_messages,
            }
        };

        self.sessions.remove(token.as_str());
        Ok(receipt)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.sessions.len();
        self.sessions.retain(|_, record| match record.lock() {
            Ok(guard) => !guard.session.is_expired_at(now),
            Err(_) => false,
        });
        Ok(before.saturating_sub(self.sessions.len()))
    }
}

#[async_trait]
impl ThreadRepository for MemoryChatStore {
    async fn find_thread(&self, id: ThreadId) -> Result<Option<Thread>> {
        Ok(self.threads.get(&id).map(|entry| entry.value().clone()))
    }

    async fn list_for_owner(&self, owner: UserId) -> Result<Vec<Thread>> {
        let mut threads: Vec<Thread> = self
            .threads
            .iter()
            .filter(|entry| entry.owner == owner)
            .map(|entry| entry.value().clone())
            .collect();
        threads.sort_by_key(|t| t.id);
        Ok(threads)
    }
}
