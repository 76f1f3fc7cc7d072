//! Portico Configuration System
//!
//! TOML-based configuration with environment variable override support.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use pt_common::RoutePaths;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub session: SessionConfig,
    pub backend: BackendConfig,
    pub routes: RoutePaths,
    pub storage: StorageConfig,

    /// Log output format: "text" or "json"
    pub log_format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            backend: BackendConfig::default(),
            routes: RoutePaths::default(),
            storage: StorageConfig::default(),
            log_format: "text".to_string(),
        }
    }
}

/// Session lifetimes and scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of an issued token pair
    pub session_duration_secs: u64,
    /// How long before expiry a refresh is started
    pub refresh_threshold_secs: u64,
    /// Period of the expiry check
    pub token_check_interval_secs: u64,
    /// Period of the permission-set refresh
    pub permission_refresh_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_duration_secs: 7 * 60,
            refresh_threshold_secs: 60,
            token_check_interval_secs: 30,
            permission_refresh_interval_secs: 5 * 60,
        }
    }
}

impl SessionConfig {
    pub fn session_duration(&self) -> Duration {
        Duration::from_secs(self.session_duration_secs)
    }

    pub fn refresh_threshold(&self) -> Duration {
        Duration::from_secs(self.refresh_threshold_secs)
    }

    pub fn token_check_interval(&self) -> Duration {
        Duration::from_secs(self.token_check_interval_secs)
    }

    pub fn permission_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.permission_refresh_interval_secs)
    }
}

/// Auth backend endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub login_path: String,
    pub refresh_path: String,
    pub permissions_path: String,
    pub logout_path: String,
    /// HTTP client timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            login_path: "/api/auth/login/".to_string(),
            refresh_path: "/api/auth/token/refresh/".to_string(),
            permissions_path: "/api/auth/permissions/".to_string(),
            logout_path: "/api/auth/logout/".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Persisted session storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store kind: file or memory
    pub kind: String,
    /// File used by the file store
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: "file".to_string(),
            path: "./data/session.json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.session;
        if s.session_duration_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session.session_duration_secs must be positive".to_string(),
            ));
        }
        if s.refresh_threshold_secs >= s.session_duration_secs {
            return Err(ConfigError::ValidationError(format!(
                "session.refresh_threshold_secs ({}) must be less than session.session_duration_secs ({})",
                s.refresh_threshold_secs, s.session_duration_secs
            )));
        }
        if s.token_check_interval_secs == 0 || s.permission_refresh_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "session check intervals must be positive".to_string(),
            ));
        }
        if self.backend.base_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "backend.base_url is required".to_string(),
            ));
        }
        match self.storage.kind.as_str() {
            "file" | "memory" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown storage.kind: {}",
                    other
                )))
            }
        }
        for (name, path) in [
            ("routes.login", &self.routes.login),
            ("routes.unauthorized", &self.routes.unauthorized),
            ("routes.home", &self.routes.home),
        ] {
            if !path.starts_with('/') {
                return Err(ConfigError::ValidationError(format!(
                    "{} must be an absolute path, got {:?}",
                    name, path
                )));
            }
        }
        Ok(())
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Portico Configuration
# Environment variables (PORTICO_*) override these settings

log_format = "text"  # text or json

[session]
session_duration_secs = 420
refresh_threshold_secs = 60
token_check_interval_secs = 30
permission_refresh_interval_secs = 300

[backend]
base_url = "http://localhost:8000"
login_path = "/api/auth/login/"
refresh_path = "/api/auth/token/refresh/"
permissions_path = "/api/auth/permissions/"
logout_path = "/api/auth/logout/"
timeout_ms = 10000

[routes]
login = "/login"
unauthorized = "/unauthorized"
home = "/"

[storage]
kind = "file"  # file or memory
path = "./data/session.json"
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_lifetimes() {
        let config = AppConfig::default();
        assert_eq!(config.session.session_duration(), Duration::from_secs(420));
        assert_eq!(config.session.refresh_threshold(), Duration::from_secs(60));
        assert_eq!(config.session.token_check_interval(), Duration::from_secs(30));
        assert_eq!(
            config.session.permission_refresh_interval(),
            Duration::from_secs(300)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_example_toml_parses_to_defaults() {
        let config = AppConfig::from_toml(&AppConfig::example_toml()).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(
            config.session.session_duration_secs,
            defaults.session.session_duration_secs
        );
        assert_eq!(config.backend.login_path, defaults.backend.login_path);
        assert_eq!(config.routes, defaults.routes);
        assert_eq!(config.storage.kind, "file");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [session]
            session_duration_secs = 900
            "#,
        )
        .unwrap();
        assert_eq!(config.session.session_duration_secs, 900);
        assert_eq!(config.session.refresh_threshold_secs, 60);
        assert_eq!(config.routes.login, "/login");
    }

    #[test]
    fn test_threshold_must_be_below_duration() {
        let mut config = AppConfig::default();
        config.session.refresh_threshold_secs = 420;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh_threshold_secs"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = AppConfig::default();
        config.session.token_check_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_storage_kind_rejected() {
        let mut config = AppConfig::default();
        config.storage.kind = "redis".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_route_rejected() {
        let mut config = AppConfig::default();
        config.routes.login = "login".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portico.toml");
        std::fs::write(&path, "[routes]\nlogin = \"/signin\"\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.routes.login, "/signin");
        assert_eq!(config.routes.unauthorized, "/unauthorized");
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = AppConfig::from_toml("[session\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
