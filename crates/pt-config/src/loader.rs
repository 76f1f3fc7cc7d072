//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "portico.toml",
    "config.toml",
    "./config/portico.toml",
    "/etc/portico/config.toml",
];

/// Env var naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "PORTICO_CONFIG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable
    /// overrides, then validate it
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        self.load_with(|key| env::var(key).ok())
    }

    /// `load` with environment variables read through `lookup`
    pub(crate) fn load_with<F>(&self, lookup: F) -> Result<AppConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file(&lookup) {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, lookup);
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file<F>(&self, lookup: &F) -> Option<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Some(path) = lookup(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply `PORTICO_*` overrides read through `lookup`
///
/// Unparseable numeric values are ignored and the file/default value kept.
pub(crate) fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

    // Session
    if let Some(v) = number("PORTICO_SESSION_DURATION_SECS") {
        config.session.session_duration_secs = v;
    }
    if let Some(v) = number("PORTICO_REFRESH_THRESHOLD_SECS") {
        config.session.refresh_threshold_secs = v;
    }
    if let Some(v) = number("PORTICO_TOKEN_CHECK_INTERVAL_SECS") {
        config.session.token_check_interval_secs = v;
    }
    if let Some(v) = number("PORTICO_PERMISSION_REFRESH_INTERVAL_SECS") {
        config.session.permission_refresh_interval_secs = v;
    }

    // Backend
    if let Some(v) = lookup("PORTICO_BACKEND_URL") {
        config.backend.base_url = v;
    }
    if let Some(v) = number("PORTICO_BACKEND_TIMEOUT_MS") {
        config.backend.timeout_ms = v;
    }

    // Routes
    if let Some(v) = lookup("PORTICO_LOGIN_PATH") {
        config.routes.login = v;
    }
    if let Some(v) = lookup("PORTICO_UNAUTHORIZED_PATH") {
        config.routes.unauthorized = v;
    }
    if let Some(v) = lookup("PORTICO_HOME_PATH") {
        config.routes.home = v;
    }

    // Storage
    if let Some(v) = lookup("PORTICO_STORAGE_KIND") {
        config.storage.kind = v;
    }
    if let Some(v) = lookup("PORTICO_STORAGE_PATH") {
        config.storage.path = v;
    }

    // General
    if let Some(v) = lookup("LOG_FORMAT") {
        config.log_format = v;
    }
}
