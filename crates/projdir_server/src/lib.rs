//! HTTP surface of the project directory.
//!
//! Every request passes the session gate first; handlers are thin adapters
//! that run core services against the shared SQLite connection on the
//! blocking pool.
//!
//! # Endpoints
//! - `GET  /api/health`
//! - `POST /api/accounts`: provision (or fetch) the account for an auth subject
//! - `GET  /api/projects`, `GET /api/projects/:id`
//! - `POST /api/projects`: submit, requires a session
//! - `POST /api/projects/:id/views`: count one visit
//! - `GET  /profile`: signed-in account, behind the protected prefix set

use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, Method},
    middleware,
    routing::{get, post},
    Router,
};
use log::{error, info};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;

pub mod config;
pub mod error;
pub mod gate;
pub mod routes;
pub mod state;

use config::{Config, ConfigError};
use projdir_core::db::DbError;
use routes::{
    fallback_handler, get_project_handler, health_handler, list_projects_handler,
    profile_handler, provision_handler, submit_project_handler, views_handler,
};
use state::AppState;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] projdir_core::LoggingError),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Builds the application router with the session gate in front of every
/// route, including the fallback.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/accounts", post(provision_handler))
        .route(
            "/api/projects",
            get(list_projects_handler).post(submit_project_handler),
        )
        .route("/api/projects/:id", get(get_project_handler))
        .route("/api/projects/:id/views", post(views_handler))
        .route("/profile", get(profile_handler))
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gate::session_gate,
        ))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server() -> Result<(), ServerError> {
    let config = Config::load()?;

    projdir_core::init_logging(&config.log_level, &config.log_dir)?;

    info!("event=server_init module=http status=start");
    let address = format!("0.0.0.0:{}", config.port);
    let state = AppState::open(config)?;
    let app = build_router(state);

    let listener = TcpListener::bind(&address).await?;
    info!("event=server_listen module=http status=ok address={address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("event=server_stop module=http status=ok");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("event=shutdown module=http status=start signal=ctrl_c"),
            Err(err) => {
                error!("event=shutdown module=http status=error error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};

        match unix_signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("event=shutdown module=http status=start signal=terminate");
            }
            Err(err) => {
                error!("event=shutdown module=http status=error error={err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
