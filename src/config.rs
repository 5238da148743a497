//! Application configuration.
//!
//! Loaded from the YAML file named by `KEEL_CONFIG` when set, otherwise
//! built from defaults. `LISTEN` overrides the listen address either way.
//! Every section and field is optional in the file.
//!
//! ```yaml
//! server:
//!   listen_addr: "0.0.0.0:8080"
//! app:
//!   debug: false
//!   admin_user: admin
//!   admin_password_sha256: "240be518..."
//! database:
//!   url: "sqlite://keel.db"
//! session:
//!   cookie_name: keel_session
//!   advisory_lock: true
//!   max_age_secs: 7200
//!   gc_interval_secs: 600
//! log:
//!   level: info
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Result;

/// Env var naming the config file.
pub const CONFIG_ENV: &str = "KEEL_CONFIG";

/// Env var overriding `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Show failure details in 500 bodies
    pub debug: bool,
    pub admin_user: String,
    /// Hex SHA-256 of the admin password
    pub admin_password_sha256: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite URL for the session table; sessions stay in memory without it
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    /// Serialize concurrent writes to one session
    pub advisory_lock: bool,
    pub max_age_secs: u64,
    pub gc_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "keel_session".to_string(),
            advisory_lock: false,
            max_age_secs: 7200,
            gc_interval_secs: 600,
        }
    }
}

impl SessionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Configuration for this process: file from `KEEL_CONFIG` or defaults,
    /// then env overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(addr) = std::env::var(LISTEN_ENV) {
            self.server.listen_addr = addr;
        }
    }
}
