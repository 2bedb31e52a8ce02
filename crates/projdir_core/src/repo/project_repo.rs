//! Project repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist and list directory projects.
//! - Expose the two view-count primitives used by the engagement counter:
//!   a single-statement atomic increment and a plain read/write pair.
//!
//! # Invariants
//! - No operation creates a project implicitly; unknown ids yield `NotFound`.
//! - Listing is deterministic: `created_at DESC, id ASC`.

use super::{parse_uuid_column, RepoError, RepoResult};
use crate::db::now_epoch_ms;
use crate::model::account::AccountId;
use crate::model::project::{Project, ProjectId};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const PROJECT_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    url,
    submitted_by,
    view_count,
    created_at
FROM projects";

/// First SQLite release supporting `UPDATE ... RETURNING`.
const RETURNING_MIN_VERSION: i32 = 3_035_000;

/// Query options for listing projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectListQuery {
    pub limit: u32,
    pub offset: u32,
}

/// Validated fields for a project insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub submitted_by: Option<AccountId>,
}

/// Repository interface for project listings.
pub trait ProjectRepository {
    fn create_project(&self, project: &NewProject) -> RepoResult<Project>;
    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>>;
    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>>;
}

/// View-count primitives with different consistency guarantees.
pub trait ViewCountRepository {
    /// Increments `view_count` by one in a single store operation and returns
    /// the new value. Safe under concurrent callers.
    fn increment_views_atomic(&self, id: ProjectId) -> RepoResult<i64>;
    /// Reads the current `view_count`.
    fn read_views(&self, id: ProjectId) -> RepoResult<i64>;
    /// Overwrites `view_count`. A read followed by this write is NOT safe
    /// under concurrent callers.
    fn write_views(&self, id: ProjectId, views: i64) -> RepoResult<()>;
}

/// SQLite-backed project repository.
pub struct SqliteProjectRepository<'conn> {
    conn: &'conn Connection,
    atomic_supported: bool,
}

impl<'conn> SqliteProjectRepository<'conn> {
    /// Creates a repository; the atomic path is enabled when the linked
    /// SQLite supports `RETURNING`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            atomic_supported: rusqlite::version_number() >= RETURNING_MIN_VERSION,
        }
    }

    /// Creates a repository with the atomic increment disabled, forcing the
    /// read/write path.
    pub fn without_atomic_increment(conn: &'conn Connection) -> Self {
        Self {
            conn,
            atomic_supported: false,
        }
    }
}

impl ProjectRepository for SqliteProjectRepository<'_> {
    fn create_project(&self, project: &NewProject) -> RepoResult<Project> {
        let id = Uuid::new_v4();
        let created_at = now_epoch_ms();

        self.conn.execute(
            "INSERT INTO projects (
                id,
                name,
                description,
                url,
                submitted_by,
                view_count,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6);",
            params![
                id.to_string(),
                project.name.as_str(),
                project.description.as_deref(),
                project.url.as_deref(),
                project.submitted_by.map(|account_id| account_id.to_string()),
                created_at,
            ],
        )?;

        Ok(Project {
            id,
            name: project.name.clone(),
            description: project.description.clone(),
            url: project.url.clone(),
            submitted_by: project.submitted_by,
            view_count: 0,
            created_at,
        })
    }

    fn get_project(&self, id: ProjectId) -> RepoResult<Option<Project>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROJECT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_project_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_projects(&self, query: &ProjectListQuery) -> RepoResult<Vec<Project>> {
        let mut stmt = self.conn.prepare(&format!(
            "{PROJECT_SELECT_SQL}
             ORDER BY created_at DESC, id ASC
             LIMIT ?1 OFFSET ?2;"
        ))?;
        let mut rows = stmt.query(params![i64::from(query.limit), i64::from(query.offset)])?;

        let mut projects = Vec::new();
        while let Some(row) = rows.next()? {
            projects.push(parse_project_row(row)?);
        }
        Ok(projects)
    }
}

impl ViewCountRepository for SqliteProjectRepository<'_> {
    fn increment_views_atomic(&self, id: ProjectId) -> RepoResult<i64> {
        if !self.atomic_supported {
            return Err(RepoError::Unsupported("update returning"));
        }

        // The bound keeps `view_count + 1` from overflowing into a REAL.
        let updated = self
            .conn
            .query_row(
                "UPDATE projects
                 SET view_count = view_count + 1
                 WHERE id = ?1 AND view_count < ?2
                 RETURNING view_count;",
                params![id.to_string(), i64::MAX],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;

        match updated {
            Some(views) => Ok(views),
            None => {
                self.read_views(id)?;
                Err(RepoError::Saturated(id))
            }
        }
    }

    fn read_views(&self, id: ProjectId) -> RepoResult<i64> {
        self.conn
            .query_row(
                "SELECT view_count FROM projects WHERE id = ?1;",
                [id.to_string()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .ok_or(RepoError::NotFound(id))
    }

    fn write_views(&self, id: ProjectId, views: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE projects SET view_count = ?1 WHERE id = ?2;",
            params![views, id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let id_text: String = row.get("id")?;
    let submitted_by = match row.get::<_, Option<String>>("submitted_by")? {
        Some(value) => Some(parse_uuid_column(&value, "projects.submitted_by")?),
        None => None,
    };

    let view_count: i64 = row.get("view_count")?;
    if view_count < 0 {
        return Err(RepoError::InvalidData(format!(
            "negative view_count `{view_count}` in projects.view_count"
        )));
    }

    Ok(Project {
        id: parse_uuid_column(&id_text, "projects.id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        url: row.get("url")?,
        submitted_by,
        view_count,
        created_at: row.get("created_at")?,
    })
}
