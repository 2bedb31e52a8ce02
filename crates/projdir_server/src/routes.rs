use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use log::info;
use projdir_core::{
    AccountRepository, EngagementCounter, IdentityAllocator, IncrementPath, ProjectId,
    ProjectService, ProjectSubmission, ProvisionRequest, SqliteAccountRepository,
    SqliteProjectRepository,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{error::AppError, gate::CurrentSession, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    limit: Option<u32>,
    #[serde(default)]
    offset: u32,
}

pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "version": projdir_core::core_version() })),
    )
}

/// `POST /api/accounts`: idempotent account provisioning.
pub async fn provision_handler(
    State(state): State<AppState>,
    payload: Result<Json<ProvisionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload.map_err(|_| AppError::MalformedPayload)?;

    let provisioned = state
        .run_blocking(move |conn, config| {
            let allocator = IdentityAllocator::with_max_attempts(
                SqliteAccountRepository::new(conn),
                config.handle_max_attempts,
            );
            Ok(allocator.allocate(&request)?)
        })
        .await?;

    Ok(Json(json!({ "success": true, "account": provisioned.account })))
}

/// `POST /api/projects/:id/views`: counts one visit.
pub async fn views_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let project_id = parse_project_id(&id)?;

    let increment = state
        .run_blocking(move |conn, config| {
            let repo = if config.atomic_view_increment {
                SqliteProjectRepository::new(conn)
            } else {
                SqliteProjectRepository::without_atomic_increment(conn)
            };
            Ok(EngagementCounter::new(repo).increment(project_id)?)
        })
        .await?;

    let mode = match increment.path {
        IncrementPath::Atomic => "atomic",
        IncrementPath::Fallback => "fallback",
    };
    Ok(Json(json!({
        "success": true,
        "views": increment.views,
        "mode": mode,
    })))
}

/// `GET /api/projects`
pub async fn list_projects_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let projects = state
        .run_blocking(move |conn, _| {
            let service = ProjectService::new(SqliteProjectRepository::new(conn));
            Ok(service.list(params.limit, params.offset)?)
        })
        .await?;

    Ok(Json(json!({ "success": true, "projects": projects })))
}

/// `GET /api/projects/:id`
pub async fn get_project_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let project_id = parse_project_id(&id)?;

    let project = state
        .run_blocking(move |conn, _| {
            let service = ProjectService::new(SqliteProjectRepository::new(conn));
            Ok(service.get(project_id)?)
        })
        .await?;

    Ok(Json(json!({ "success": true, "project": project })))
}

/// `POST /api/projects`: requires a session attached by the gate.
pub async fn submit_project_handler(
    State(state): State<AppState>,
    session: Option<Extension<CurrentSession>>,
    payload: Result<Json<ProjectSubmission>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Some(Extension(CurrentSession(grant))) = session else {
        return Err(AppError::Unauthorized);
    };
    let Json(submission) = payload.map_err(|_| AppError::MalformedPayload)?;

    let project = state
        .run_blocking(move |conn, _| {
            let service = ProjectService::new(SqliteProjectRepository::new(conn));
            Ok(service.submit(&submission, grant.account_id)?)
        })
        .await?;

    Ok(Json(json!({ "success": true, "project": project })))
}

/// `GET /profile`: the signed-in account. Reachable only through the gate's
/// protected prefix set.
pub async fn profile_handler(
    State(state): State<AppState>,
    session: Option<Extension<CurrentSession>>,
) -> Result<impl IntoResponse, AppError> {
    let Some(Extension(CurrentSession(grant))) = session else {
        return Err(AppError::Unauthorized);
    };

    let account = state
        .run_blocking(move |conn, _| {
            Ok(SqliteAccountRepository::new(conn).get_account(grant.account_id)?)
        })
        .await?
        .ok_or(AppError::NotFound("Account"))?;

    Ok(Json(json!({ "success": true, "account": account })))
}

pub async fn fallback_handler() -> AppError {
    AppError::NotFound("Route")
}

fn parse_project_id(raw: &str) -> Result<ProjectId, AppError> {
    Uuid::parse_str(raw).map_err(|_| {
        info!("event=project_lookup module=http status=error error_code=invalid_id");
        AppError::NotFound("Project")
    })
}
