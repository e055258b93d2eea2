pub mod figures;
pub mod purge;
pub mod trial;
pub mod upgrade;

use histchat_core::HistchatError;
use histchat_core::guest::SessionToken;

/// Parses a token argument; malformed tokens are reported like unknown ones.
pub fn parse_token(raw: &str) -> Result<SessionToken, HistchatError> {
    SessionToken::parse(raw.trim()).ok_or(HistchatError::InvalidSession)
}
