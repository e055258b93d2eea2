//! Opaque guest session tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Random bytes behind every token (256 bits).
pub const TOKEN_ENTROPY_BYTES: usize = 32;

const MAX_TOKEN_LEN: usize = 128;

/// An unguessable lookup key for a guest session.
///
/// The token carries no payload. `Debug` and `redacted()` never print the
/// full value so tokens stay out of logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Generates a fresh URL-safe token from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Accepts a client-supplied token if it is well formed.
    ///
    /// Well formed means non-empty, bounded length, URL-safe base64 alphabet.
    /// Well-formedness says nothing about whether the session exists.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.len() > MAX_TOKEN_LEN {
            return None;
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return None;
        }
        Some(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log fields.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{prefix}...")
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({})", self.redacted())
    }
}
