//! Server configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for the MES server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// `SQLite` database path; `None` runs on an in-memory database.
    pub database_path: Option<String>,
    /// Shared HS256 secret for access-token verification.
    pub jwt_secret: String,
    /// Per-connection outbound channel capacity.
    pub outbound_buffer: usize,
    /// Seconds to wait for in-flight tasks when draining on shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            database_path: None,
            jwt_secret: "dev-secret-change-me".into(),
            outbound_buffer: 256,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Build a config from defaults overridden by `MES_*` environment
    /// variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        config
    }
}

/// Apply `MES_*` overrides read through `get` (injected for testability).
fn apply_env_overrides(config: &mut ServerConfig, get: impl Fn(&str) -> Option<String>) {
    if let Some(host) = get("MES_HOST") {
        config.host = host;
    }
    if let Some(port) = get("MES_PORT") {
        match port.parse::<u16>() {
            Ok(p) => config.port = p,
            Err(_) => warn!(value = %port, "ignoring invalid MES_PORT"),
        }
    }
    if let Some(path) = get("MES_DATABASE_PATH") {
        config.database_path = Some(path);
    }
    if let Some(secret) = get("MES_JWT_SECRET") {
        config.jwt_secret = secret;
    }
    if let Some(timeout) = get("MES_SHUTDOWN_TIMEOUT_SECS") {
        match timeout.parse::<u64>() {
            Ok(secs) => config.shutdown_timeout_secs = secs,
            Err(_) => warn!(value = %timeout, "ignoring invalid MES_SHUTDOWN_TIMEOUT_SECS"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
