//! Cookie header lookup and refresh serialization.
//!
//! Token contents are opaque here; only name lookup and `Set-Cookie`
//! formatting happen in this module.

use crate::db::now_epoch_ms;

/// Returns the value of cookie `name` from a `Cookie` header.
///
/// Empty values are treated as absent.
pub fn find_cookie<'h>(header: &'h str, name: &str) -> Option<&'h str> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Session cookie rewrite produced when the session store extends a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRefresh {
    pub name: String,
    pub value: String,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

impl CookieRefresh {
    pub fn new(name: String, value: String, expires_at: i64) -> Self {
        Self {
            name,
            value,
            expires_at,
        }
    }

    /// Formats a `Set-Cookie` header value relative to the current time.
    pub fn to_header_value(&self) -> String {
        self.header_value_at(now_epoch_ms())
    }

    fn header_value_at(&self, now_ms: i64) -> String {
        let max_age_secs = (self.expires_at - now_ms).max(0) / 1000;
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name, self.value, max_age_secs
        )
    }
}
