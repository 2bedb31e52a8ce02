//! SQLite session store backing the routing gate.
//!
//! # Responsibility
//! - Resolve opaque cookie tokens to live sessions.
//! - Slide the expiry of sessions that are close to lapsing.
//! - Issue and revoke tokens for the development auth stand-in.
//!
//! # Invariants
//! - Expired tokens never resolve.
//! - Token values are never logged.

use super::{parse_uuid_column, RepoResult};
use crate::db::now_epoch_ms;
use crate::gate::{SessionError, SessionGrant, SessionResolver};
use crate::model::account::AccountId;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::time::Duration;
use uuid::Uuid;

/// Session lifetime policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Lifetime granted on issue and on refresh.
    pub ttl: Duration,
    /// Sessions expiring within this window are extended on resolve.
    pub refresh_window: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(7 * 24 * 60 * 60),
            refresh_window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Newly issued session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub account_id: AccountId,
    /// Epoch milliseconds.
    pub expires_at: i64,
}

/// SQLite-backed session store.
pub struct SqliteSessionStore<'conn> {
    conn: &'conn Connection,
    policy: SessionPolicy,
}

impl<'conn> SqliteSessionStore<'conn> {
    pub fn new(conn: &'conn Connection, policy: SessionPolicy) -> Self {
        Self { conn, policy }
    }

    /// Issues a fresh token for `account_id`.
    pub fn issue_session(&self, account_id: AccountId) -> RepoResult<IssuedSession> {
        let token = format!(
            "{}{}",
            Uuid::new_v4().simple(),
            Uuid::new_v4().simple()
        );
        let expires_at = now_epoch_ms().saturating_add(duration_ms(self.policy.ttl));

        self.conn.execute(
            "INSERT INTO sessions (token, account_id, expires_at) VALUES (?1, ?2, ?3);",
            params![token.as_str(), account_id.to_string(), expires_at],
        )?;
        info!(
            "event=session_issue module=session status=ok account_id={}",
            account_id
        );

        Ok(IssuedSession {
            token,
            account_id,
            expires_at,
        })
    }

    /// Deletes `token`; returns whether a session was removed.
    pub fn revoke_session(&self, token: &str) -> RepoResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE token = ?1;", [token])?;
        Ok(removed > 0)
    }

    fn resolve_at(&self, token: &str, now_ms: i64) -> RepoResult<Option<SessionGrant>> {
        let row = self
            .conn
            .query_row(
                "SELECT account_id, expires_at FROM sessions WHERE token = ?1;",
                [token],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        let Some((account_text, expires_at)) = row else {
            return Ok(None);
        };
        if expires_at <= now_ms {
            return Ok(None);
        }
        let account_id = parse_uuid_column(&account_text, "sessions.account_id")?;

        if expires_at - now_ms > duration_ms(self.policy.refresh_window) {
            return Ok(Some(SessionGrant {
                account_id,
                expires_at,
                refreshed: false,
            }));
        }

        let extended = now_ms.saturating_add(duration_ms(self.policy.ttl));
        self.conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE token = ?2;",
            params![extended, token],
        )?;
        Ok(Some(SessionGrant {
            account_id,
            expires_at: extended,
            refreshed: true,
        }))
    }
}

impl SessionResolver for SqliteSessionStore<'_> {
    fn resolve(&self, token: &str) -> Result<Option<SessionGrant>, SessionError> {
        Ok(self.resolve_at(token, now_epoch_ms())?)
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
