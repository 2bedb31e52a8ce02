//! Environment-driven server configuration.
//!
//! Every key has a logged default except where noted; malformed values are
//! reported as `ConfigError` instead of being silently replaced.

use log::{info, warn};
use projdir_core::{default_log_level, RouteConfig, SessionPolicy, DEFAULT_MAX_HANDLE_ATTEMPTS};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_SESSION_COOKIE: &str = "projdir-session";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Runtime configuration for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub session_cookie: String,
    pub routes: RouteConfig,
    pub session_policy: SessionPolicy,
    pub handle_max_attempts: u32,
    /// When false, view increments always take the read/write path.
    pub atomic_view_increment: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            db_path: PathBuf::from("projdir.sqlite3"),
            log_dir: env::temp_dir().join("projdir-logs"),
            log_level: default_log_level().to_string(),
            session_cookie: DEFAULT_SESSION_COOKIE.to_string(),
            routes: RouteConfig::default(),
            session_policy: SessionPolicy::default(),
            handle_max_attempts: DEFAULT_MAX_HANDLE_ATTEMPTS,
            atomic_view_increment: true,
        }
    }
}

impl Config {
    /// Loads configuration from process environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let loader = Loader { lookup: &lookup };

        let routes = RouteConfig {
            protected_prefixes: loader.list(
                "PROJDIR_PROTECTED_PREFIXES",
                defaults.routes.protected_prefixes,
            )?,
            auth_only_prefixes: loader.list(
                "PROJDIR_AUTH_ONLY_PREFIXES",
                defaults.routes.auth_only_prefixes,
            )?,
            sign_in_path: loader.path("PROJDIR_SIGN_IN_PATH", defaults.routes.sign_in_path)?,
            landing_path: loader.path("PROJDIR_LANDING_PATH", defaults.routes.landing_path)?,
        };

        let session_policy = SessionPolicy {
            ttl: Duration::from_secs(loader.parsed(
                "PROJDIR_SESSION_TTL_SECS",
                defaults.session_policy.ttl.as_secs(),
            )?),
            refresh_window: Duration::from_secs(loader.parsed(
                "PROJDIR_SESSION_REFRESH_WINDOW_SECS",
                defaults.session_policy.refresh_window.as_secs(),
            )?),
        };

        let log_dir: PathBuf = loader.parsed("PROJDIR_LOG_DIR", defaults.log_dir)?;
        if !log_dir.is_absolute() {
            return Err(ConfigError::Invalid {
                key: "PROJDIR_LOG_DIR",
                message: format!("must be absolute, got `{}`", log_dir.display()),
            });
        }

        let session_cookie: String =
            loader.parsed("PROJDIR_SESSION_COOKIE", defaults.session_cookie)?;
        if session_cookie.is_empty()
            || session_cookie
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, ';' | '=' | ','))
        {
            return Err(ConfigError::Invalid {
                key: "PROJDIR_SESSION_COOKIE",
                message: format!("`{session_cookie}` is not a valid cookie name"),
            });
        }

        let handle_max_attempts: u32 =
            loader.parsed("PROJDIR_HANDLE_MAX_ATTEMPTS", defaults.handle_max_attempts)?;
        if handle_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                key: "PROJDIR_HANDLE_MAX_ATTEMPTS",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            port: loader.parsed("PROJDIR_PORT", defaults.port)?,
            db_path: loader.parsed("PROJDIR_DB_PATH", defaults.db_path)?,
            log_dir,
            log_level: loader.parsed("PROJDIR_LOG_LEVEL", defaults.log_level)?,
            session_cookie,
            routes,
            session_policy,
            handle_max_attempts,
            atomic_view_increment: loader
                .parsed("PROJDIR_ATOMIC_VIEWS", defaults.atomic_view_increment)?,
        })
    }
}

struct Loader<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Loader<'_> {
    fn var(&self, key: &str) -> Option<String> {
        let value = (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if value.is_none() {
            info!("event=config_default module=config key={key}");
        }
        value
    }

    fn parsed<T>(&self, key: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.var(key) {
            Some(raw) => raw.parse().map_err(|err: T::Err| {
                warn!("event=config_invalid module=config key={key}");
                ConfigError::Invalid {
                    key,
                    message: err.to_string(),
                }
            }),
            None => Ok(default),
        }
    }

    fn path(&self, key: &'static str, default: String) -> Result<String, ConfigError> {
        let value: String = self.parsed(key, default)?;
        if !value.starts_with('/') {
            return Err(ConfigError::Invalid {
                key,
                message: format!("`{value}` must start with `/`"),
            });
        }
        Ok(value)
    }

    fn list(&self, key: &'static str, default: Vec<String>) -> Result<Vec<String>, ConfigError> {
        let Some(raw) = self.var(key) else {
            return Ok(default);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|prefix| !prefix.is_empty())
            .map(|prefix| {
                if prefix.starts_with('/') {
                    Ok(prefix.to_string())
                } else {
                    Err(ConfigError::Invalid {
                        key,
                        message: format!("prefix `{prefix}` must start with `/`"),
                    })
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError};
    use std::collections::HashMap;
    use std::time::Duration;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        assert_eq!(load(&[]).unwrap(), Config::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("PROJDIR_PORT", "9000"),
            ("PROJDIR_PROTECTED_PREFIXES", "/admin, /settings"),
            ("PROJDIR_SESSION_TTL_SECS", "60"),
            ("PROJDIR_HANDLE_MAX_ATTEMPTS", "7"),
            ("PROJDIR_ATOMIC_VIEWS", "false"),
        ])
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.routes.protected_prefixes, vec!["/admin", "/settings"]);
        assert_eq!(config.session_policy.ttl, Duration::from_secs(60));
        assert_eq!(config.handle_max_attempts, 7);
        assert!(!config.atomic_view_increment);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = load(&[("PROJDIR_PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PROJDIR_PORT", .. }));

        let err = load(&[("PROJDIR_AUTH_ONLY_PREFIXES", "auth/signin")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PROJDIR_AUTH_ONLY_PREFIXES", .. }));

        let err = load(&[("PROJDIR_LOG_DIR", "relative/logs")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PROJDIR_LOG_DIR", .. }));

        let err = load(&[("PROJDIR_SESSION_COOKIE", "bad name")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PROJDIR_SESSION_COOKIE", .. }));

        let err = load(&[("PROJDIR_HANDLE_MAX_ATTEMPTS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PROJDIR_HANDLE_MAX_ATTEMPTS", .. }));

        let err = load(&[("PROJDIR_ATOMIC_VIEWS", "sometimes")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PROJDIR_ATOMIC_VIEWS", .. }));
    }
}
