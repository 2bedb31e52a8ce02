//! Session-gated routing policy.
//!
//! # Responsibility
//! - Classify request paths against injected protected/auth-only prefix sets.
//! - Resolve the caller's session cookie through a `SessionResolver`.
//! - Decide pass vs redirect for every inbound request.
//!
//! # Invariants
//! - Any resolver failure is treated as "no valid session": protected routes
//!   fail closed, public and auth-only routes fail open.
//! - The gate keeps no state across requests.
//! - Prefixes match whole path segments only.

use crate::model::account::AccountId;
use crate::repo::RepoError;
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod cookie;

pub use cookie::{find_cookie, CookieRefresh};

/// Static route policy for the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// Prefixes that require a valid session.
    pub protected_prefixes: Vec<String>,
    /// Prefixes that must not be visited with a valid session.
    pub auth_only_prefixes: Vec<String>,
    /// Redirect target for unauthenticated access to protected routes.
    pub sign_in_path: String,
    /// Redirect target for authenticated access to auth-only routes.
    pub landing_path: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: vec![
                "/dashboard".to_string(),
                "/submit".to_string(),
                "/profile".to_string(),
            ],
            auth_only_prefixes: vec!["/auth/signin".to_string(), "/auth/signup".to_string()],
            sign_in_path: "/auth/signin".to_string(),
            landing_path: "/dashboard".to_string(),
        }
    }
}

/// Path classification under a `RouteConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Protected,
    AuthOnly,
    Public,
}

impl RouteConfig {
    /// Classifies `path`; protected wins when a path matches both sets.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self
            .protected_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            RouteClass::Protected
        } else if self
            .auth_only_prefixes
            .iter()
            .any(|prefix| matches_prefix(path, prefix))
        {
            RouteClass::AuthOnly
        } else {
            RouteClass::Public
        }
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// A valid session resolved from a cookie token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub account_id: AccountId,
    /// Epoch milliseconds.
    pub expires_at: i64,
    /// Set when resolution extended the session, so the cookie must be
    /// rewritten on the response.
    pub refreshed: bool,
}

/// Failure to resolve a session token.
#[derive(Debug)]
pub enum SessionError {
    /// The backing session store could not be queried.
    Store(RepoError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "session store unavailable: {err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for SessionError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// External session collaborator.
pub trait SessionResolver {
    /// Resolves `token` to a live session; `Ok(None)` for unknown or expired
    /// tokens.
    fn resolve(&self, token: &str) -> Result<Option<SessionGrant>, SessionError>;
}

impl<T: SessionResolver + ?Sized> SessionResolver for &T {
    fn resolve(&self, token: &str) -> Result<Option<SessionGrant>, SessionError> {
        (**self).resolve(token)
    }
}

/// Request facts the gate needs.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub path: &'a str,
    /// Raw `Cookie` header value(s) joined with `; `.
    pub cookie_header: Option<&'a str>,
}

/// Routing outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Redirect(String),
}

/// Full gate result: decision plus session side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub decision: GateDecision,
    /// Resolved session, exposed to downstream handlers on pass.
    pub session: Option<SessionGrant>,
    /// Cookie to set on the response when the session was refreshed.
    pub cookie_refresh: Option<CookieRefresh>,
}

/// Per-request routing gate.
pub struct SessionGate<S: SessionResolver> {
    routes: RouteConfig,
    cookie_name: String,
    resolver: S,
}

impl<S: SessionResolver> SessionGate<S> {
    pub fn new(routes: RouteConfig, cookie_name: impl Into<String>, resolver: S) -> Self {
        Self {
            routes,
            cookie_name: cookie_name.into(),
            resolver,
        }
    }

    pub fn routes(&self) -> &RouteConfig {
        &self.routes
    }

    /// Decides whether `request` may proceed.
    ///
    /// Performs at most one resolver call and never retries.
    pub fn admit(&self, request: &GateRequest<'_>) -> Admission {
        let class = self.routes.classify(request.path);
        let token = request
            .cookie_header
            .and_then(|header| find_cookie(header, &self.cookie_name));

        let session = match token {
            Some(token) => match self.resolver.resolve(token) {
                Ok(grant) => grant,
                Err(err) => {
                    warn!(
                        "event=session_resolve module=gate status=error class={:?} error={}",
                        class, err
                    );
                    None
                }
            },
            None => None,
        };

        let decision = decide(&self.routes, class, request.path, session.is_some());
        debug!(
            "event=gate_admit module=gate status=ok class={:?} authenticated={} redirect={}",
            class,
            session.is_some(),
            matches!(decision, GateDecision::Redirect(_))
        );

        let cookie_refresh = match (&session, token) {
            (Some(grant), Some(token)) if grant.refreshed => Some(CookieRefresh::new(
                self.cookie_name.clone(),
                token.to_string(),
                grant.expires_at,
            )),
            _ => None,
        };

        Admission {
            decision,
            session,
            cookie_refresh,
        }
    }
}

fn decide(routes: &RouteConfig, class: RouteClass, path: &str, authenticated: bool) -> GateDecision {
    match (class, authenticated) {
        (RouteClass::Protected, false) => GateDecision::Redirect(format!(
            "{}?redirectedFrom={}",
            routes.sign_in_path,
            encode_query_value(path)
        )),
        (RouteClass::AuthOnly, true) => GateDecision::Redirect(routes.landing_path.clone()),
        _ => GateDecision::Pass,
    }
}

/// Percent-encodes characters that would break a query parameter value.
/// `/` is left readable.
fn encode_query_value(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(char::from(byte));
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use uuid::Uuid;

    struct FixedResolver {
        outcome: Result<Option<SessionGrant>, ()>,
        calls: Cell<u32>,
    }

    impl FixedResolver {
        fn valid(refreshed: bool) -> Self {
            Self {
                outcome: Ok(Some(SessionGrant {
                    account_id: Uuid::nil(),
                    expires_at: 1_000,
                    refreshed,
                })),
                calls: Cell::new(0),
            }
        }

        fn none() -> Self {
            Self {
                outcome: Ok(None),
                calls: Cell::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                outcome: Err(()),
                calls: Cell::new(0),
            }
        }
    }

    impl SessionResolver for FixedResolver {
        fn resolve(&self, _token: &str) -> Result<Option<SessionGrant>, SessionError> {
            self.calls.set(self.calls.get() + 1);
            self.outcome
                .clone()
                .map_err(|()| SessionError::Store(RepoError::Unsupported("offline")))
        }
    }

    fn admit(resolver: &FixedResolver, path: &str, cookie: Option<&str>) -> Admission {
        let gate = SessionGate::new(RouteConfig::default(), "sid", resolver);
        gate.admit(&GateRequest {
            path,
            cookie_header: cookie,
        })
    }

    #[test]
    fn classifies_on_segment_boundaries() {
        let routes = RouteConfig::default();
        assert_eq!(routes.classify("/dashboard"), RouteClass::Protected);
        assert_eq!(routes.classify("/dashboard/settings"), RouteClass::Protected);
        assert_eq!(routes.classify("/submitted"), RouteClass::Public);
        assert_eq!(routes.classify("/auth/signup"), RouteClass::AuthOnly);
        assert_eq!(routes.classify("/auth/callback"), RouteClass::Public);
        assert_eq!(routes.classify("/projects"), RouteClass::Public);
    }

    #[test]
    fn protected_without_session_redirects_to_sign_in() {
        let resolver = FixedResolver::none();
        let admission = admit(&resolver, "/dashboard", None);
        assert_eq!(
            admission.decision,
            GateDecision::Redirect("/auth/signin?redirectedFrom=/dashboard".to_string())
        );
        assert_eq!(resolver.calls.get(), 0);
    }

    #[test]
    fn protected_with_session_passes() {
        let resolver = FixedResolver::valid(false);
        let admission = admit(&resolver, "/profile/edit", Some("theme=dark; sid=abc"));
        assert_eq!(admission.decision, GateDecision::Pass);
        assert!(admission.session.is_some());
        assert!(admission.cookie_refresh.is_none());
    }

    #[test]
    fn auth_only_with_session_redirects_to_landing() {
        let resolver = FixedResolver::valid(false);
        let admission = admit(&resolver, "/auth/signin", Some("sid=abc"));
        assert_eq!(
            admission.decision,
            GateDecision::Redirect("/dashboard".to_string())
        );
    }

    #[test]
    fn auth_only_without_session_passes() {
        let resolver = FixedResolver::none();
        let admission = admit(&resolver, "/auth/signup", Some("sid=stale"));
        assert_eq!(admission.decision, GateDecision::Pass);
        assert_eq!(resolver.calls.get(), 1);
    }

    #[test]
    fn public_route_passes_regardless_of_session() {
        for resolver in [
            FixedResolver::none(),
            FixedResolver::valid(false),
            FixedResolver::failing(),
        ] {
            let admission = admit(&resolver, "/projects", Some("sid=abc"));
            assert_eq!(admission.decision, GateDecision::Pass);
        }
    }

    #[test]
    fn resolver_failure_fails_closed_on_protected_routes() {
        let resolver = FixedResolver::failing();
        let admission = admit(&resolver, "/submit", Some("sid=abc"));
        assert_eq!(
            admission.decision,
            GateDecision::Redirect("/auth/signin?redirectedFrom=/submit".to_string())
        );
        assert!(admission.session.is_none());
    }

    #[test]
    fn refreshed_session_rewrites_cookie() {
        let resolver = FixedResolver::valid(true);
        let admission = admit(&resolver, "/projects", Some("sid=abc"));
        let refresh = admission.cookie_refresh.expect("refresh cookie");
        assert_eq!(refresh.name, "sid");
        assert_eq!(refresh.value, "abc");
        assert_eq!(refresh.expires_at, 1_000);
    }

    #[test]
    fn redirect_target_escapes_query_breaking_characters() {
        assert_eq!(encode_query_value("/submit/a b&c"), "/submit/a%20b%26c");
    }
}
