//! Account repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Look up accounts by auth subject and handle.
//! - Insert accounts, reporting uniqueness conflicts as a tagged outcome.
//!
//! # Invariants
//! - `insert_account` never overwrites an existing row.
//! - A conflict names exactly one violated unique column.

use super::{parse_uuid_column, RepoError, RepoResult};
use crate::db::now_epoch_ms;
use crate::model::account::{Account, AccountId, AccountRole, NewAccount, UniqueField};
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const ACCOUNT_SELECT_SQL: &str = "SELECT
    id,
    auth_id,
    email,
    display_name,
    handle,
    avatar_url,
    role,
    created_at
FROM accounts";

/// Result of an insert attempt against unique constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(Account),
    Conflict(UniqueField),
}

/// Repository interface for account identity storage.
pub trait AccountRepository {
    /// Loads the account bound to an external auth subject.
    fn find_by_auth_id(&self, auth_id: &str) -> RepoResult<Option<Account>>;
    /// Loads one account by primary key.
    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>>;
    /// Returns whether any account currently holds `handle`.
    ///
    /// The answer may be stale by the time the caller acts on it.
    fn handle_exists(&self, handle: &str) -> RepoResult<bool>;
    /// Inserts a new account or reports which unique column collided.
    fn insert_account(&self, account: &NewAccount) -> RepoResult<InsertOutcome>;
}

/// SQLite-backed account repository.
pub struct SqliteAccountRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccountRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl AccountRepository for SqliteAccountRepository<'_> {
    fn find_by_auth_id(&self, auth_id: &str) -> RepoResult<Option<Account>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACCOUNT_SELECT_SQL} WHERE auth_id = ?1;"))?;
        let mut rows = stmt.query([auth_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_account_row(row)?)),
            None => Ok(None),
        }
    }

    fn get_account(&self, id: AccountId) -> RepoResult<Option<Account>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACCOUNT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_account_row(row)?)),
            None => Ok(None),
        }
    }

    fn handle_exists(&self, handle: &str) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM accounts WHERE handle = ?1 LIMIT 1;",
                [handle],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_account(&self, account: &NewAccount) -> RepoResult<InsertOutcome> {
        let id = Uuid::new_v4();
        let created_at = now_epoch_ms();

        let result = self.conn.execute(
            "INSERT INTO accounts (
                id,
                auth_id,
                email,
                display_name,
                handle,
                avatar_url,
                role,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                id.to_string(),
                account.auth_id.as_str(),
                account.email.as_str(),
                account.display_name.as_deref(),
                account.handle.as_str(),
                account.avatar_url.as_deref(),
                account.role.as_str(),
                created_at,
            ],
        );

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(Account {
                id,
                auth_id: account.auth_id.clone(),
                email: account.email.clone(),
                display_name: account.display_name.clone(),
                handle: account.handle.clone(),
                avatar_url: account.avatar_url.clone(),
                role: account.role,
                created_at,
            })),
            Err(err) => match unique_violation(&err) {
                Some(field) => Ok(InsertOutcome::Conflict(field)),
                None => Err(err.into()),
            },
        }
    }
}

/// Maps a SQLite unique-constraint failure to the violated account column.
fn unique_violation(err: &rusqlite::Error) -> Option<UniqueField> {
    let rusqlite::Error::SqliteFailure(failure, Some(message)) = err else {
        return None;
    };
    if failure.extended_code != ffi::SQLITE_CONSTRAINT_UNIQUE {
        return None;
    }

    // Message shape: "UNIQUE constraint failed: accounts.handle"
    [UniqueField::Handle, UniqueField::AuthId, UniqueField::Email]
        .into_iter()
        .find(|field| message.contains(&format!("accounts.{}", field.column())))
}

fn parse_account_row(row: &Row<'_>) -> RepoResult<Account> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid_column(&id_text, "accounts.id")?;

    let role_text: String = row.get("role")?;
    let role = AccountRole::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in accounts.role"))
    })?;

    Ok(Account {
        id,
        auth_id: row.get("auth_id")?,
        email: row.get("email")?,
        display_name: row.get("display_name")?,
        handle: row.get("handle")?,
        avatar_url: row.get("avatar_url")?,
        role,
        created_at: row.get("created_at")?,
    })
}
