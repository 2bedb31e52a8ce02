use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::error;
use projdir_core::db::DbError;
use projdir_core::{EngagementError, ProjectServiceError, ProvisionError, ValidationError};
use serde_json::json;
use thiserror::Error;

const GENERIC_INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload")]
    MalformedPayload,

    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    /// Detail is logged server-side and never sent to the caller.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedPayload | AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::Validation { field, message } => json!({
                "success": false,
                "error": message,
                "field": field,
            }),
            AppError::Internal(detail) => {
                error!("event=request_failed module=http status=error error={detail}");
                json!({ "success": false, "error": GENERIC_INTERNAL_MESSAGE })
            }
            other => json!({ "success": false, "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(value: ValidationError) -> Self {
        AppError::Validation {
            field: value.field,
            message: value.message,
        }
    }
}

impl From<ProvisionError> for AppError {
    fn from(value: ProvisionError) -> Self {
        match value {
            ProvisionError::Validation(err) => err.into(),
            ProvisionError::EmailTaken => AppError::Conflict("Email is already registered"),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<EngagementError> for AppError {
    fn from(value: EngagementError) -> Self {
        match value {
            EngagementError::NotFound(_) => AppError::NotFound("Project"),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ProjectServiceError> for AppError {
    fn from(value: ProjectServiceError) -> Self {
        match value {
            ProjectServiceError::Validation(err) => err.into(),
            ProjectServiceError::NotFound(_) => AppError::NotFound("Project"),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<DbError> for AppError {
    fn from(value: DbError) -> Self {
        AppError::Internal(value.to_string())
    }
}

impl From<projdir_core::RepoError> for AppError {
    fn from(value: projdir_core::RepoError) -> Self {
        AppError::Internal(value.to_string())
    }
}
