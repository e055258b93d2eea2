//! Guest session and transcript models.

use super::token::SessionToken;
use crate::completion::{ChatMessage, ChatRole};
use crate::error::{HistchatError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a guest session.
///
/// `Active` is the only state that accepts `Ask`. `Exhausted` still accepts
/// `Upgrade`; `Expired` and `Migrated` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestState {
    Active,
    Exhausted,
    Expired,
    Migrated,
}

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            _ => None,
        }
    }
}

impl From<MessageRole> for ChatRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
        }
    }
}

/// A time-boxed, quota-limited anonymous session bound to one figure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestSession {
    pub token: SessionToken,
    pub figure_slug: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub question_count: u32,
    pub max_questions: u32,
    /// Set while a migration holds the session; never cleared
    pub revoked: bool,
}

impl GuestSession {
    pub fn new(
        token: SessionToken,
        figure_slug: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
        max_questions: u32,
    ) -> Result<Self> {
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| HistchatError::config("guest session TTL overflows the clock"))?;

        Ok(Self {
            token,
            figure_slug: figure_slug.into(),
            created_at: now,
            expires_at,
            question_count: 0,
            max_questions,
            revoked: false,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> GuestState {
        if self.revoked {
            GuestState::Migrated
        } else if self.is_expired_at(now) {
            GuestState::Expired
        } else if self.question_count >= self.max_questions {
            GuestState::Exhausted
        } else {
            GuestState::Active
        }
    }

    pub fn remaining_questions(&self) -> u32 {
        self.max_questions.saturating_sub(self.question_count)
    }

    /// Checks whether one more question may be asked at `now`.
    pub fn check_ask(&self, now: DateTime<Utc>) -> Result<()> {
        match self.state_at(now) {
            GuestState::Active => Ok(()),
            GuestState::Migrated => Err(HistchatError::InvalidSession),
            GuestState::Expired => Err(HistchatError::SessionExpired {
                expired_at: self.expires_at,
            }),
            GuestState::Exhausted => Err(HistchatError::QuotaExceeded {
                max_questions: self.max_questions,
                expires_at: self.expires_at,
            }),
        }
    }

    /// Check-and-increment. Stores call this while holding the session's
    /// lock (or inside the conditional update's transaction).
    pub fn consume_question(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.check_ask(now)?;
        self.question_count += 1;
        Ok(())
    }
}

/// One immutable transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestMessage {
    /// Per-session insertion order; the ordering authority
    pub sequence: u64,
    pub role: MessageRole,
    pub content: String,
    pub model_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&GuestMessage> for ChatMessage {
    fn from(message: &GuestMessage) -> Self {
        ChatMessage {
            role: message.role.into(),
            content: message.content.clone(),
        }
    }
}

/// A transcript entry before the store assigns its sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGuestMessage {
    pub role: MessageRole,
    pub content: String,
    pub model_used: Option<String>,
}

impl NewGuestMessage {
    pub fn user(content: impl Into<String>, model_used: Option<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            model_used,
        }
    }

    pub fn assistant(content: impl Into<String>, model_used: Option<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            model_used,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(now: DateTime<Utc>, max: u32) -> GuestSession {
        GuestSession::new(
            SessionToken::generate(),
            "cleopatra",
            now,
            Duration::minutes(120),
            max,
        )
        .unwrap()
    }

    #[test]
    fn test_new_session_is_active() {
        let now = Utc::now();
        let s = session(now, 3);
        assert_eq!(s.state_at(now), GuestState::Active);
        assert_eq!(s.remaining_questions(), 3);
        assert_eq!(s.expires_at, now + Duration::minutes(120));
    }

    #[test]
    fn test_consume_until_exhausted() {
        let now = Utc::now();
        let mut s = session(now, 3);
        for expected_remaining in [2, 1, 0] {
            s.consume_question(now).unwrap();
            assert_eq!(s.remaining_questions(), expected_remaining);
        }
        assert_eq!(s.state_at(now), GuestState::Exhausted);

        let err = s.consume_question(now).unwrap_err();
        assert!(matches!(
            err,
            HistchatError::QuotaExceeded { max_questions: 3, .. }
        ));
        assert_eq!(s.question_count, 3);
    }

    #[test]
    fn test_expired_session_rejects_even_with_quota_left() {
        let now = Utc::now();
        let s = session(now - Duration::minutes(121), 3);
        assert_eq!(s.question_count, 0);
        assert_eq!(s.state_at(now), GuestState::Expired);
        assert!(matches!(
            s.check_ask(now),
            Err(HistchatError::SessionExpired { .. })
        ));
    }

    #[test]
    fn test_expiry_takes_precedence_over_quota() {
        let now = Utc::now();
        let mut s = session(now - Duration::minutes(121), 1);
        s.question_count = 1;
        assert!(matches!(
            s.check_ask(now),
            Err(HistchatError::SessionExpired { .. })
        ));
    }

    #[test]
    fn test_revoked_session_is_invalid() {
        let now = Utc::now();
        let mut s = session(now, 3);
        s.revoked = true;
        assert_eq!(s.state_at(now), GuestState::Migrated);
        assert_eq!(s.check_ask(now), Err(HistchatError::InvalidSession));
    }

    #[test]
    fn test_ttl_past_the_clock_range_is_rejected() {
        let err = GuestSession::new(
            SessionToken::generate(),
            "cleopatra",
            Utc::now(),
            Duration::days(200_000_000),
            3,
        )
        .unwrap_err();
        assert!(matches!(err, HistchatError::Config(_)));
    }

    #[test]
    fn test_role_round_trip_through_str() {
        for role in [MessageRole::User, MessageRole::Assistant] {
            assert_eq!(MessageRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(MessageRole::parse("system"), None);
    }
}
