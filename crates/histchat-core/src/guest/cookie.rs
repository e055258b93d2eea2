//! Guest cookie transport.
//!
//! The cookie is HttpOnly, same-site and time-bound. Its value is the bare
//! session token.

use super::token::SessionToken;
use crate::config::CookieConfig;
use chrono::Duration;

/// Builds and reads the guest session cookie.
pub struct GuestCookie<'a> {
    config: &'a CookieConfig,
}

impl<'a> GuestCookie<'a> {
    pub fn new(config: &'a CookieConfig) -> Self {
        Self { config }
    }

    /// `Set-Cookie` value issued by `Start`.
    pub fn issue(&self, token: &SessionToken, ttl: Duration) -> String {
        self.render(token.as_str(), ttl.num_seconds().max(0))
    }

    /// `Set-Cookie` value that removes the cookie after `Upgrade`.
    pub fn clear(&self) -> String {
        self.render("", 0)
    }

    /// Extracts the guest token from a `Cookie` request header.
    pub fn token_from_header(&self, header: &str) -> Option<SessionToken> {
        header
            .split(';')
            .filter_map(|pair| pair.split_once('='))
            .find(|(name, _)| name.trim() == self.config.name)
            .and_then(|(_, value)| SessionToken::parse(value))
    }

    fn render(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Max-Age={}; Path={}; HttpOnly; SameSite={}",
            self.config.name,
            value,
            max_age,
            self.config.path,
            self.config.same_site.as_str()
        );
        if self.config.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
