use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("project not found: {0}")]
    NotFound(Uuid),

    #[error("view increment rejected with status {0}")]
    Status(u16),

    #[error("no tokio runtime available to schedule the increment")]
    NoRuntime,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}
