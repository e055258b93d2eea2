//! Thread domain model.

use crate::guest::MessageRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registered user identifier, issued by the external auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(pub i64);

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A durable conversation owned by exactly one registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    pub owner: UserId,
    pub title: String,
    pub figure_slug: Option<String>,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<ThreadMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// Zero-based position within the thread
    pub position: u64,
    pub user_id: UserId,
    pub role: MessageRole,
    pub content: String,
    pub model_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything a store needs to create the destination thread of a
/// migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadDraft {
    pub owner: UserId,
    pub title: String,
    pub figure_slug: Option<String>,
}

impl ThreadDraft {
    /// Draft for a guest transcript about `figure_slug`.
    pub fn for_guest_transcript(owner: UserId, figure_slug: &str) -> Self {
        let label = if figure_slug.trim().is_empty() {
            "figure"
        } else {
            figure_slug
        };
        Self {
            owner,
            title: format!("Guest chat with {label}"),
            figure_slug: Some(figure_slug.to_string()).filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Result of a completed guest-to-user migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReceipt {
    pub thread_id: ThreadId,
    pub transferred_messages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_draft_title() {
        let draft = ThreadDraft::for_guest_transcript(UserId(7), "cleopatra");
        assert_eq!(draft.title, "Guest chat with cleopatra");
        assert_eq!(draft.figure_slug.as_deref(), Some("cleopatra"));
        assert_eq!(draft.owner, UserId(7));

        let blank = ThreadDraft::for_guest_transcript(UserId(7), "");
        assert_eq!(blank.title, "Guest chat with figure");
        assert_eq!(blank.figure_slug, None);
    }
}
