//! Core domain logic for the project directory.
//!
//! This crate owns identity allocation, view counting and the session
//! routing policy; the server and CLI crates are thin adapters around it.

pub mod db;
pub mod gate;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use gate::{
    Admission, GateDecision, GateRequest, RouteClass, RouteConfig, SessionError, SessionGate,
    SessionGrant, SessionResolver,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::account::{
    Account, AccountId, AccountRole, NewAccount, ProvisionRequest, UniqueField, ValidationError,
};
pub use model::project::{Project, ProjectId, ProjectSubmission};
pub use repo::account_repo::{AccountRepository, InsertOutcome, SqliteAccountRepository};
pub use repo::project_repo::{
    NewProject, ProjectListQuery, ProjectRepository, SqliteProjectRepository, ViewCountRepository,
};
pub use repo::session_repo::{IssuedSession, SessionPolicy, SqliteSessionStore};
pub use repo::{RepoError, RepoResult};
pub use service::engagement_service::{
    EngagementCounter, EngagementError, IncrementPath, ViewIncrement,
};
pub use service::identity_service::{
    IdentityAllocator, ProvisionError, Provisioned, DEFAULT_MAX_HANDLE_ATTEMPTS,
};
pub use service::project_service::{ProjectService, ProjectServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
