//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts that services depend on.
//! - Isolate SQL details from service orchestration so services can be
//!   exercised against in-memory fakes.
//!
//! # Invariants
//! - Uniqueness violations are reported as data (`InsertOutcome::Conflict`),
//!   never as transport errors.
//! - Repository APIs return semantic errors (`NotFound`, `Unsupported`) in
//!   addition to DB transport errors.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod account_repo;
pub mod project_repo;
pub mod session_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all persistence contracts.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target row does not exist.
    NotFound(Uuid),
    /// The store cannot perform the requested operation.
    Unsupported(&'static str),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// A counter on the row is already at its maximum value.
    Saturated(Uuid),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::Unsupported(operation) => write!(f, "operation unsupported by store: {operation}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Saturated(id) => write!(f, "counter saturated: {id}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::NotFound(_)
            | Self::Unsupported(_)
            | Self::InvalidData(_)
            | Self::Saturated(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

pub(crate) fn parse_uuid_column(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}
