//! Error types for histchat.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// A shared error type for the entire histchat workspace.
///
/// Variants split into three groups:
/// - user-correctable lookups (`NotFound`)
/// - guest trial policy boundaries (`SessionExpired`, `QuotaExceeded`,
///   `RateLimited`) that a client should turn into a registration prompt
/// - infrastructure failures (`UpstreamUnavailable`, `DataAccess`, ...)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HistchatError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Unknown, revoked or replayed guest token
    #[error("Invalid guest session")]
    InvalidSession,

    /// Guest session TTL has passed
    #[error("Guest session expired at {expired_at}")]
    SessionExpired { expired_at: DateTime<Utc> },

    /// Guest session has used all of its questions
    #[error("Guest question limit reached ({max_questions} questions)")]
    QuotaExceeded {
        max_questions: u32,
        expires_at: DateTime<Utc>,
    },

    /// Too many guest sessions started from one client
    #[error("Too many guest sessions started, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Completion or retrieval service failed or timed out
    #[error("Upstream service '{service}' unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    /// Guest session is already being migrated
    #[error("Guest session migration already in progress")]
    MigrationConflict,

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Data access error (repository/storage layer)
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HistchatError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an UpstreamUnavailable error
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a DataAccess error
    pub fn data_access(message: impl Into<String>) -> Self {
        Self::DataAccess(message.into())
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a guest trial policy boundary.
    ///
    /// Clients should answer these with a registration prompt rather than an
    /// error page.
    pub fn is_policy_boundary(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired { .. } | Self::QuotaExceeded { .. } | Self::RateLimited { .. }
        )
    }

    /// Check if the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::RateLimited { .. }
        )
    }

    /// Maps the error to the client-visible status code.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidSession => 400,
            Self::SessionExpired { .. } => 401,
            Self::QuotaExceeded { .. } => 403,
            Self::MigrationConflict => 409,
            Self::RateLimited { .. } => 429,
            Self::UpstreamUnavailable { .. } => 503,
            _ => 500,
        }
    }

    /// Seconds left before the guest session expires, for policy errors that
    /// carry an expiry.
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> Option<i64> {
        match self {
            Self::QuotaExceeded { expires_at, .. } => {
                Some((*expires_at - now).num_seconds().max(0))
            }
            Self::SessionExpired { .. } => Some(0),
            _ => None,
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for HistchatError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for HistchatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for HistchatError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for HistchatError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for HistchatError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Conversion from String (for error messages)
impl From<String> for HistchatError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, HistchatError>`.
pub type Result<T> = std::result::Result<T, HistchatError>;
