//! Runtime settings loaded from environment variables.
//!
//! Values are read once at startup (after `.env` has been loaded by `dotenvy`).
//! Unset variables fall back to defaults; set but malformed ones are a configuration
//! error rather than being silently ignored.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Catalog seed file read at startup when `CATALOG_PATH` is unset.
pub const DEFAULT_CATALOG_PATH: &str = "catalog.toml";

/// Settings consumed by the records core.
#[derive(Debug, Clone)]
pub struct Settings {
    /// `SeaORM` connection string
    pub database_url: String,
    /// Pool size for file-backed databases; in-memory `SQLite` always uses one
    pub max_connections: u32,
    /// Artificial hold inside the exclusive student read
    pub lock_hold: Duration,
    /// Longest a caller waits for an exclusive student hold
    pub lock_wait_timeout: Duration,
    /// Principal recorded in audit fields when no other is supplied
    pub default_actor: String,
    /// Reject backward or repeated enrollment status updates
    pub strict_status_transitions: bool,
    /// Catalog seed file; a missing file means nothing to seed
    pub catalog_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            lock_hold: Duration::from_millis(15_000),
            lock_wait_timeout: Duration::from_millis(30_000),
            default_actor: "admin".to_string(),
            strict_status_transitions: false,
            catalog_path: PathBuf::from(DEFAULT_CATALOG_PATH),
        }
    }
}

impl Settings {
    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS`, `STUDENT_LOCK_HOLD_MS`, `STUDENT_LOCK_WAIT_MS`,
    /// `RECORDS_ACTOR`, `STRICT_STATUS_TRANSITIONS` and `CATALOG_PATH`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let millis = |key: &str, default: Duration| -> Result<Duration> {
            lookup(key).map_or(Ok(default), |raw| {
                raw.trim()
                    .parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|e| Error::Config {
                        message: format!("{key} must be a number of milliseconds: {e}"),
                    })
            })
        };

        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            None => defaults.max_connections,
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(Error::Config {
                        message: format!("DATABASE_MAX_CONNECTIONS must be a positive integer: {raw}"),
                    });
                }
            },
        };

        let strict_status_transitions = match lookup("STRICT_STATUS_TRANSITIONS") {
            None => defaults.strict_status_transitions,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                other => {
                    return Err(Error::Config {
                        message: format!("STRICT_STATUS_TRANSITIONS is not a boolean: {other}"),
                    });
                }
            },
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections,
            lock_hold: millis("STUDENT_LOCK_HOLD_MS", defaults.lock_hold)?,
            lock_wait_timeout: millis("STUDENT_LOCK_WAIT_MS", defaults.lock_wait_timeout)?,
            default_actor: lookup("RECORDS_ACTOR")
                .filter(|actor| !actor.trim().is_empty())
                .unwrap_or(defaults.default_actor),
            strict_status_transitions,
            catalog_path: lookup("CATALOG_PATH").map_or(defaults.catalog_path, PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(|_| None).unwrap();
        assert_eq!(settings.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(settings.max_connections, 5);
        assert_eq!(settings.lock_hold, Duration::from_secs(15));
        assert_eq!(settings.default_actor, "admin");
        assert!(!settings.strict_status_transitions);
        assert_eq!(settings.catalog_path, PathBuf::from("catalog.toml"));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("DATABASE_MAX_CONNECTIONS", "8"),
            ("STUDENT_LOCK_HOLD_MS", "250"),
            ("STUDENT_LOCK_WAIT_MS", "1000"),
            ("RECORDS_ACTOR", "registrar"),
            ("STRICT_STATUS_TRANSITIONS", "true"),
            ("CATALOG_PATH", "seed/dev.toml"),
        ]))
        .unwrap();
        assert_eq!(settings.database_url, "sqlite::memory:");
        assert_eq!(settings.max_connections, 8);
        assert_eq!(settings.lock_hold, Duration::from_millis(250));
        assert_eq!(settings.lock_wait_timeout, Duration::from_secs(1));
        assert_eq!(settings.default_actor, "registrar");
        assert!(settings.strict_status_transitions);
        assert_eq!(settings.catalog_path, PathBuf::from("seed/dev.toml"));
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let result = Settings::from_lookup(lookup_from(&[("STUDENT_LOCK_HOLD_MS", "soon")]));
        assert!(matches!(result, Err(Error::Config { .. })));

        let result = Settings::from_lookup(lookup_from(&[("STRICT_STATUS_TRANSITIONS", "maybe")]));
        assert!(matches!(result, Err(Error::Config { .. })));

        let result = Settings::from_lookup(lookup_from(&[("DATABASE_MAX_CONNECTIONS", "0")]));
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_blank_actor_falls_back() {
        let settings = Settings::from_lookup(lookup_from(&[("RECORDS_ACTOR", "  ")])).unwrap();
        assert_eq!(settings.default_actor, "admin");
    }
}
