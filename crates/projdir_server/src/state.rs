use std::sync::{Arc, Mutex};

use projdir_core::db::{open_db, DbResult};
use rusqlite::Connection;

use super::{config::Config, error::AppError};

/// Shared handler state: configuration plus the single store connection.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    db: Arc<Mutex<Connection>>,
}

impl AppState {
    /// Opens (and migrates) the configured database file.
    pub fn open(config: Config) -> DbResult<Self> {
        let conn = open_db(&config.db_path)?;
        Ok(Self::with_connection(config, conn))
    }

    pub fn with_connection(config: Config, conn: Connection) -> Self {
        Self {
            config: Arc::new(config),
            db: Arc::new(Mutex::new(conn)),
        }
    }

    /// Runs a store operation on the blocking pool while holding the
    /// connection lock.
    pub async fn run_blocking<T, F>(&self, operation: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection, &Config) -> Result<T, AppError> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let config = Arc::clone(&self.config);

        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))?;
            operation(&conn, &config)
        })
        .await
        .map_err(|err| AppError::Internal(format!("blocking task failed: {err}")))?
    }
}
