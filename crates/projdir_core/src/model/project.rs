//! Project (directory resource) record.
//!
//! # Invariants
//! - `view_count >= 0` and never decreases under correct operation.
//! - `view_count` is mutated only by the engagement counter.

use super::account::AccountId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProjectId = Uuid;

/// Persisted project listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub submitted_by: Option<AccountId>,
    pub view_count: i64,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Submission payload for a new project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSubmission {
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
}
