//! Account provisioning and public handle allocation.
//!
//! # Responsibility
//! - Validate provisioning input before touching the store.
//! - Return the existing account for a known auth subject.
//! - Derive a handle and search `base`, `base1`, `base2`, ... for a free one.
//!
//! # Invariants
//! - The store's unique constraint on `handle` is authoritative; the
//!   existence check only skips candidates known to be taken.
//! - The search performs at most `max_attempts` candidates.
//! - Re-provisioning a known `auth_id` never allocates a handle.

use crate::model::account::{
    Account, AccountRole, NewAccount, ProvisionRequest, UniqueField, ValidationError,
};
use crate::repo::account_repo::{AccountRepository, InsertOutcome};
use crate::repo::RepoError;
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Default bound on handle candidates tried per provisioning.
pub const DEFAULT_MAX_HANDLE_ATTEMPTS: u32 = 100;
const MAX_HANDLE_BASE_CHARS: usize = 32;

static HANDLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("valid handle regex"));
static HANDLE_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.-]+").expect("valid handle strip regex"));

/// Provisioning failure.
#[derive(Debug)]
pub enum ProvisionError {
    /// Required field missing or malformed.
    Validation(ValidationError),
    /// The email is already bound to a different auth subject.
    EmailTaken,
    /// Every candidate up to the attempt bound collided.
    HandleExhausted { base: String, attempts: u32 },
    /// Persistence-layer failure.
    Repo(RepoError),
    /// The store reported a conflict it cannot explain on read-back.
    InconsistentState(&'static str),
}

impl Display for ProvisionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::EmailTaken => write!(f, "email is already registered"),
            Self::HandleExhausted { base, attempts } => write!(
                f,
                "no free handle for base `{base}` after {attempts} attempts"
            ),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent account state: {details}"),
        }
    }
}

impl Error for ProvisionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProvisionError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<ValidationError> for ProvisionError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Provisioning result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub account: Account,
    /// `false` when an existing account was returned.
    pub created: bool,
}

/// Validated provisioning input with a derived handle base.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidatedRequest {
    auth_id: String,
    email: String,
    display_name: Option<String>,
    handle_base: String,
    avatar_url: Option<String>,
    role: AccountRole,
}

/// Allocates collision-free handles for new accounts.
pub struct IdentityAllocator<R: AccountRepository> {
    repo: R,
    max_attempts: u32,
}

impl<R: AccountRepository> IdentityAllocator<R> {
    /// Creates an allocator with `DEFAULT_MAX_HANDLE_ATTEMPTS`.
    pub fn new(repo: R) -> Self {
        Self::with_max_attempts(repo, DEFAULT_MAX_HANDLE_ATTEMPTS)
    }

    /// Creates an allocator bounded to `max_attempts` candidates (min 1).
    pub fn with_max_attempts(repo: R, max_attempts: u32) -> Self {
        Self {
            repo,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Returns the account for `request.auth_id`, creating it if needed.
    ///
    /// # Errors
    /// - `Validation` when `authId`/`email` are blank or the handle base is
    ///   unusable.
    /// - `EmailTaken` when another subject owns the email.
    /// - `HandleExhausted` after `max_attempts` collisions.
    /// - `Repo` on storage failure.
    pub fn allocate(&self, request: &ProvisionRequest) -> Result<Provisioned, ProvisionError> {
        let request = validate(request)?;

        if let Some(account) = self.repo.find_by_auth_id(&request.auth_id)? {
            info!(
                "event=account_provision module=identity status=ok created=false account_id={}",
                account.id
            );
            return Ok(Provisioned {
                account,
                created: false,
            });
        }

        for attempt in 0..self.max_attempts {
            let handle = candidate_handle(&request.handle_base, attempt);
            if self.repo.handle_exists(&handle)? {
                continue;
            }

            let new_account = NewAccount {
                auth_id: request.auth_id.clone(),
                email: request.email.clone(),
                display_name: request.display_name.clone(),
                handle,
                avatar_url: request.avatar_url.clone(),
                role: request.role,
            };

            match self.repo.insert_account(&new_account)? {
                InsertOutcome::Inserted(account) => {
                    info!(
                        "event=account_provision module=identity status=ok created=true account_id={} attempts={}",
                        account.id,
                        attempt + 1
                    );
                    return Ok(Provisioned {
                        account,
                        created: true,
                    });
                }
                InsertOutcome::Conflict(UniqueField::Handle) => {
                    // Lost the race between existence check and insert.
                    info!(
                        "event=handle_conflict module=identity status=retry attempt={}",
                        attempt + 1
                    );
                }
                InsertOutcome::Conflict(UniqueField::AuthId) => {
                    // A concurrent request provisioned the same subject first.
                    let account = self.repo.find_by_auth_id(&request.auth_id)?.ok_or(
                        ProvisionError::InconsistentState("auth_id conflict without stored account"),
                    )?;
                    return Ok(Provisioned {
                        account,
                        created: false,
                    });
                }
                InsertOutcome::Conflict(UniqueField::Email) => {
                    warn!("event=account_provision module=identity status=error error_code=email_taken");
                    return Err(ProvisionError::EmailTaken);
                }
            }
        }

        warn!(
            "event=account_provision module=identity status=error error_code=handle_exhausted attempts={}",
            self.max_attempts
        );
        Err(ProvisionError::HandleExhausted {
            base: request.handle_base,
            attempts: self.max_attempts,
        })
    }
}

/// Candidate number `attempt`: the base itself, then `base1`, `base2`, ...
pub fn candidate_handle(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{base}{attempt}")
    }
}

fn validate(request: &ProvisionRequest) -> Result<ValidatedRequest, ValidationError> {
    let auth_id = required(request.auth_id.as_deref(), "authId")?;
    let email = required(request.email.as_deref(), "email")?;

    let handle_base = match non_blank(request.handle.as_deref()) {
        Some(handle) => {
            if !HANDLE_RE.is_match(handle) {
                return Err(ValidationError::new(
                    "handle",
                    "may only contain letters, digits, `_`, `.` and `-`",
                ));
            }
            if handle.chars().count() > MAX_HANDLE_BASE_CHARS {
                return Err(ValidationError::new(
                    "handle",
                    format!("must be at most {MAX_HANDLE_BASE_CHARS} characters"),
                ));
            }
            handle.to_string()
        }
        None => derive_handle_from_email(email)?,
    };

    let role = match non_blank(request.role.as_deref()) {
        Some(value) => AccountRole::parse(value)
            .ok_or_else(|| ValidationError::new("role", format!("unknown role `{value}`")))?,
        None => AccountRole::default(),
    };

    Ok(ValidatedRequest {
        auth_id: auth_id.to_string(),
        email: email.to_string(),
        display_name: non_blank(request.display_name.as_deref()).map(str::to_string),
        handle_base,
        avatar_url: non_blank(request.avatar_url.as_deref()).map(str::to_string),
        role,
    })
}

fn derive_handle_from_email(email: &str) -> Result<String, ValidationError> {
    let local_part = email.split('@').next().unwrap_or_default();
    let stripped = HANDLE_STRIP_RE.replace_all(local_part, "");
    let base: String = stripped.chars().take(MAX_HANDLE_BASE_CHARS).collect();
    if base.is_empty() {
        return Err(ValidationError::new(
            "email",
            "local part yields no usable handle characters",
        ));
    }
    Ok(base)
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ValidationError> {
    non_blank(value).ok_or_else(|| ValidationError::new(field, "is required"))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
