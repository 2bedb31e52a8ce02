//! Project browsing and submission use-cases.
//!
//! # Invariants
//! - Names are trimmed and non-empty; optional text fields collapse blank
//!   input to `None`.
//! - URLs, when present, are absolute `http`/`https` links.
//! - List limits are clamped to `1..=MAX_LIST_LIMIT`.

use crate::model::account::{AccountId, ValidationError};
use crate::model::project::{Project, ProjectId, ProjectSubmission};
use crate::repo::project_repo::{NewProject, ProjectListQuery, ProjectRepository};
use crate::repo::RepoError;
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_LIST_LIMIT: u32 = 20;
pub const MAX_LIST_LIMIT: u32 = 100;
const MAX_NAME_CHARS: usize = 120;

/// Service error for project use-cases.
#[derive(Debug)]
pub enum ProjectServiceError {
    Validation(ValidationError),
    NotFound(ProjectId),
    Repo(RepoError),
}

impl Display for ProjectServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "project not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProjectServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<RepoError> for ProjectServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<ValidationError> for ProjectServiceError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Project service facade over repository implementations.
pub struct ProjectService<R: ProjectRepository> {
    repo: R,
}

impl<R: ProjectRepository> ProjectService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validates and stores a submission on behalf of `submitted_by`.
    pub fn submit(
        &self,
        submission: &ProjectSubmission,
        submitted_by: AccountId,
    ) -> Result<Project, ProjectServiceError> {
        let project = validate_submission(submission, submitted_by)?;
        let created = self.repo.create_project(&project)?;
        info!(
            "event=project_submit module=project status=ok project_id={} account_id={}",
            created.id, submitted_by
        );
        Ok(created)
    }

    /// Loads one project.
    pub fn get(&self, id: ProjectId) -> Result<Project, ProjectServiceError> {
        self.repo
            .get_project(id)?
            .ok_or(ProjectServiceError::NotFound(id))
    }

    /// Lists projects newest first.
    pub fn list(&self, limit: Option<u32>, offset: u32) -> Result<Vec<Project>, ProjectServiceError> {
        let query = ProjectListQuery {
            limit: normalize_list_limit(limit),
            offset,
        };
        Ok(self.repo.list_projects(&query)?)
    }
}

/// Applies the default and clamps to the supported range.
pub fn normalize_list_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

fn validate_submission(
    submission: &ProjectSubmission,
    submitted_by: AccountId,
) -> Result<NewProject, ValidationError> {
    let name = submission.name.trim();
    if name.is_empty() {
        return Err(ValidationError::new("name", "is required"));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::new(
            "name",
            format!("must be at most {MAX_NAME_CHARS} characters"),
        ));
    }

    let url = trimmed(submission.url.as_deref());
    if let Some(url) = url.as_deref() {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ValidationError::new("url", "must be an http(s) link"));
        }
    }

    Ok(NewProject {
        name: name.to_string(),
        description: trimmed(submission.description.as_deref()),
        url,
        submitted_by: Some(submitted_by),
    })
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{normalize_list_limit, validate_submission};
    use crate::model::project::ProjectSubmission;
    use uuid::Uuid;

    #[test]
    fn list_limit_defaults_and_clamps() {
        assert_eq!(normalize_list_limit(None), 20);
        assert_eq!(normalize_list_limit(Some(0)), 1);
        assert_eq!(normalize_list_limit(Some(500)), 100);
    }

    #[test]
    fn submission_is_trimmed_and_checked() {
        let project = validate_submission(
            &ProjectSubmission {
                name: "  Ferris Finder ".to_string(),
                description: Some("   ".to_string()),
                url: Some(" https://ferris.dev ".to_string()),
            },
            Uuid::nil(),
        )
        .unwrap();
        assert_eq!(project.name, "Ferris Finder");
        assert_eq!(project.description, None);
        assert_eq!(project.url.as_deref(), Some("https://ferris.dev"));

        let err = validate_submission(
            &ProjectSubmission {
                name: "x".to_string(),
                description: None,
                url: Some("ftp://nope".to_string()),
            },
            Uuid::nil(),
        )
        .unwrap_err();
        assert_eq!(err.field, "url");
    }
}
