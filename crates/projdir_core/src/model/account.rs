//! Account identity record.
//!
//! # Invariants
//! - `handle`, `auth_id` and `email` are each unique across all accounts.
//! - An account is created once and never re-created for the same `auth_id`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Store-assigned account identifier.
pub type AccountId = Uuid;

/// Authorization role of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    /// Regular member who can submit projects.
    #[default]
    Submitter,
    /// Directory moderator.
    Admin,
}

impl AccountRole {
    /// Stable string stored in `accounts.role`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitter => "submitter",
            Self::Admin => "admin",
        }
    }

    /// Parses a stored or client-supplied role value.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "submitter" => Some(Self::Submitter),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Persisted account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    /// Subject identifier issued by the external auth provider.
    pub auth_id: String,
    pub email: String,
    pub display_name: Option<String>,
    /// Public unique username.
    pub handle: String,
    pub avatar_url: Option<String>,
    pub role: AccountRole,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Account fields supplied at insert time; `id` and `created_at` are
/// assigned by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub auth_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub handle: String,
    pub avatar_url: Option<String>,
    pub role: AccountRole,
}

/// Uniquely constrained account column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    AuthId,
    Email,
    Handle,
}

impl UniqueField {
    pub fn column(self) -> &'static str {
        match self {
            Self::AuthId => "auth_id",
            Self::Email => "email",
            Self::Handle => "handle",
        }
    }
}

/// Input for account provisioning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    pub auth_id: Option<String>,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub handle: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
}

/// Field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// camelCase name of the offending request field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}
