//! Server settings: built-in defaults overridden by `GRID_*` environment
//! variables (a `.env` file is loaded by `main` before reading them).

use crate::engine::error::GridError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Grid definitions JSON; the embedded demo definitions when unset.
    pub definitions_path: Option<PathBuf>,
    pub staging_dir: PathBuf,
    pub staging_ttl: Duration,
    pub busy_timeout: Duration,
    /// SQL script applied once at start-up.
    pub bootstrap_sql: Option<PathBuf>,
    /// Idle time after which an anti-forgery session is forgotten.
    pub session_ttl: Duration,
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            database_path: PathBuf::from("grid.sqlite"),
            definitions_path: None,
            staging_dir: env::temp_dir().join("grid_imports"),
            staging_ttl: Duration::from_secs(3600),
            busy_timeout: Duration::from_secs(5),
            bootstrap_sql: None,
            session_ttl: Duration::from_secs(8 * 3600),
            max_sessions: 10_000,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, GridError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Applies overrides from `lookup`; blank values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GridError> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = ServerConfig::default();

        if let Some(host) = var("GRID_HOST") {
            config.host = host;
        }
        if let Some(port) = var("GRID_PORT") {
            config.port = parse("GRID_PORT", &port)?;
        }
        if let Some(path) = var("GRID_DATABASE") {
            config.database_path = path.into();
        }
        if let Some(path) = var("GRID_DEFINITIONS") {
            config.definitions_path = Some(path.into());
        }
        if let Some(dir) = var("GRID_STAGING_DIR") {
            config.staging_dir = dir.into();
        }
        if let Some(secs) = var("GRID_STAGING_TTL_SECS") {
            config.staging_ttl = Duration::from_secs(parse("GRID_STAGING_TTL_SECS", &secs)?);
        }
        if let Some(ms) = var("GRID_BUSY_TIMEOUT_MS") {
            config.busy_timeout = Duration::from_millis(parse("GRID_BUSY_TIMEOUT_MS", &ms)?);
        }
        if let Some(path) = var("GRID_BOOTSTRAP_SQL") {
            config.bootstrap_sql = Some(path.into());
        }
        if let Some(secs) = var("GRID_SESSION_TTL_SECS") {
            config.session_ttl = Duration::from_secs(parse("GRID_SESSION_TTL_SECS", &secs)?);
        }
        if let Some(max) = var("GRID_MAX_SESSIONS") {
            config.max_sessions = parse("GRID_MAX_SESSIONS", &max)?;
        }
        Ok(config)
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, GridError> {
    raw.parse()
        .map_err(|_| GridError::Configuration(format!("Invalid value '{}' for {}", raw, key)))
}
