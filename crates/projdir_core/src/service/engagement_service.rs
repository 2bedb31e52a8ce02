//! Project view counting.
//!
//! # Responsibility
//! - Advance a project's `view_count` by exactly one per tracked visit.
//! - Prefer the store's atomic increment; fall back to read-modify-write only
//!   when the atomic path fails with a storage error.
//!
//! # Invariants
//! - `IncrementPath::Atomic` results are exact under concurrent callers.
//! - `IncrementPath::Fallback` results are degraded: two concurrent fallback
//!   increments of the same project can both read `n` and both write `n + 1`,
//!   losing one view. Callers receive the tag and may surface or alert on it.
//! - A missing project is reported as `NotFound` and never created.
//! - A count at `i64::MAX` is never written; both paths report `Saturated`.

use crate::model::project::ProjectId;
use crate::repo::project_repo::ViewCountRepository;
use crate::repo::RepoError;
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Which branch produced an increment, and therefore its guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementPath {
    /// Single store operation; no lost updates.
    Atomic,
    /// Read then write; may lose updates under concurrency.
    Fallback,
}

/// Successful increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewIncrement {
    /// Count after this increment, as reported by the store.
    pub views: i64,
    pub path: IncrementPath,
}

/// View counting failure.
#[derive(Debug)]
pub enum EngagementError {
    /// Project does not exist.
    NotFound(ProjectId),
    /// Both the atomic and the fallback path failed.
    Storage {
        atomic: RepoError,
        fallback: RepoError,
    },
}

impl Display for EngagementError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "project not found: {id}"),
            Self::Storage { atomic, fallback } => write!(
                f,
                "view increment failed (atomic: {atomic}; fallback: {fallback})"
            ),
        }
    }
}

impl Error for EngagementError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound(_) => None,
            Self::Storage { fallback, .. } => Some(fallback),
        }
    }
}

/// Dual-path view counter.
pub struct EngagementCounter<R: ViewCountRepository> {
    repo: R,
}

impl<R: ViewCountRepository> EngagementCounter<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Increments the view count of `project_id` by one.
    ///
    /// Performs one store call on the atomic path and up to two more on the
    /// fallback path.
    pub fn increment(&self, project_id: ProjectId) -> Result<ViewIncrement, EngagementError> {
        let atomic_err = match self.repo.increment_views_atomic(project_id) {
            Ok(views) => {
                info!(
                    "event=view_increment module=engagement status=ok path=atomic project_id={} views={}",
                    project_id, views
                );
                return Ok(ViewIncrement {
                    views,
                    path: IncrementPath::Atomic,
                });
            }
            Err(RepoError::NotFound(_)) => return Err(EngagementError::NotFound(project_id)),
            Err(err) => err,
        };

        warn!(
            "event=view_increment module=engagement status=degraded path=fallback project_id={} error={}",
            project_id, atomic_err
        );

        match self.read_modify_write(project_id) {
            Ok(views) => Ok(ViewIncrement {
                views,
                path: IncrementPath::Fallback,
            }),
            Err(RepoError::NotFound(_)) => Err(EngagementError::NotFound(project_id)),
            Err(fallback_err) => {
                warn!(
                    "event=view_increment module=engagement status=error path=fallback project_id={} error={}",
                    project_id, fallback_err
                );
                Err(EngagementError::Storage {
                    atomic: atomic_err,
                    fallback: fallback_err,
                })
            }
        }
    }

    fn read_modify_write(&self, project_id: ProjectId) -> Result<i64, RepoError> {
        let current = self.repo.read_views(project_id)?;
        let next = current
            .checked_add(1)
            .ok_or(RepoError::Saturated(project_id))?;
        self.repo.write_views(project_id, next)?;
        Ok(next)
    }
}
