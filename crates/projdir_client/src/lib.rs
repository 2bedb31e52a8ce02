//! Client side of project view counting.
//!
//! A project page mounts a [`ViewTracker`] that waits out a debounce delay,
//! optimistically bumps the displayed count and asks a [`ViewIncrementer`]
//! (normally [`HttpViewClient`]) to count the visit once.

pub mod error;
pub mod http;
pub mod tracker;

pub use error::TrackerError;
pub use http::HttpViewClient;
pub use tracker::{DisplayedViews, TrackerConfig, ViewTracker, DEFAULT_VIEW_DELAY};

use async_trait::async_trait;
use serde::Deserialize;
use uuid::Uuid;

/// Which server branch counted the visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncrementMode {
    Atomic,
    Fallback,
}

/// Server-reported count after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ViewCount {
    pub views: i64,
    pub mode: IncrementMode,
}

/// Sends one view increment for a project.
#[async_trait]
pub trait ViewIncrementer: Send + Sync {
    async fn increment(&self, project_id: Uuid) -> Result<ViewCount, TrackerError>;
}
