//! Session gate middleware.
//!
//! Runs before routing on every request, applies the core routing policy and
//! exposes the resolved session to handlers as a `CurrentSession` extension.

use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use log::warn;
use projdir_core::gate::find_cookie;
use projdir_core::{
    Admission, GateDecision, GateRequest, RepoError, SessionError, SessionGate, SessionGrant,
    SessionResolver, SqliteSessionStore,
};

use crate::{config::Config, state::AppState};

/// Session attached to a request that passed the gate while signed in.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub SessionGrant);

/// Stand-in resolver used when the store cannot be reached or no token was
/// sent; it never yields a session.
struct NoSessionStore {
    reachable: bool,
}

impl SessionResolver for NoSessionStore {
    fn resolve(&self, _token: &str) -> Result<Option<SessionGrant>, SessionError> {
        if self.reachable {
            Ok(None)
        } else {
            Err(SessionError::Store(RepoError::Unsupported(
                "session store unavailable",
            )))
        }
    }
}

pub async fn session_gate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let cookie_header = joined_cookie_header(request.headers());

    let admission = admit(&state, path, cookie_header).await;

    let mut response = match admission.decision {
        GateDecision::Redirect(location) => Redirect::temporary(&location).into_response(),
        GateDecision::Pass => {
            if let Some(grant) = admission.session {
                request.extensions_mut().insert(CurrentSession(grant));
            }
            next.run(request).await
        }
    };

    if let Some(refresh) = admission.cookie_refresh {
        match HeaderValue::from_str(&refresh.to_header_value()) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(err) => warn!("event=cookie_refresh module=gate status=error error={err}"),
        }
    }

    response
}

async fn admit(state: &AppState, path: String, cookie_header: Option<String>) -> Admission {
    let config = &state.config;
    let has_token = cookie_header
        .as_deref()
        .and_then(|header| find_cookie(header, &config.session_cookie))
        .is_some();

    if !has_token {
        return admit_without_store(config, &path, cookie_header.as_deref(), true);
    }

    let fallback_path = path.clone();
    let fallback_cookie = cookie_header.clone();
    let resolved = state
        .run_blocking(move |conn, config| {
            let store = SqliteSessionStore::new(conn, config.session_policy);
            let gate = SessionGate::new(config.routes.clone(), config.session_cookie.clone(), store);
            Ok(gate.admit(&GateRequest {
                path: &path,
                cookie_header: cookie_header.as_deref(),
            }))
        })
        .await;

    match resolved {
        Ok(admission) => admission,
        Err(err) => {
            warn!("event=session_resolve module=gate status=error error={err}");
            admit_without_store(config, &fallback_path, fallback_cookie.as_deref(), false)
        }
    }
}

fn admit_without_store(
    config: &Config,
    path: &str,
    cookie_header: Option<&str>,
    reachable: bool,
) -> Admission {
    SessionGate::new(
        config.routes.clone(),
        config.session_cookie.clone(),
        NoSessionStore { reachable },
    )
    .admit(&GateRequest {
        path,
        cookie_header,
    })
}

fn joined_cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}
