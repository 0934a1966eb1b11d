//! Configuration
//!
//! Loaded once at startup from a TOML file and/or environment variables and
//! handed to the client by value. Nothing in the crate reads configuration
//! from ambient state after composition.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Logical endpoint names understood by `DentalApi`.
pub mod endpoints {
    pub const PATIENTS: &str = "pacientes";
    pub const CALENDAR: &str = "calendario";
    pub const AGENDA: &str = "agenda";
    pub const STATISTICS: &str = "estadisticas";
    pub const APPOINTMENTS: &str = "turnos";
    pub const CREATE_APPOINTMENT: &str = "crear-turno";
    pub const WEEKLY_APPOINTMENTS: &str = "turnos-por-semana";
    pub const HEALTH: &str = "health";

    pub const ALL: [&str; 8] = [
        PATIENTS,
        CALENDAR,
        AGENDA,
        STATISTICS,
        APPOINTMENTS,
        CREATE_APPOINTMENT,
        WEEKLY_APPOINTMENTS,
        HEALTH,
    ];
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Logical name -> path segment. Missing names fall back to identity.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

fn default_base_url() -> String {
    "http://localhost:5678/webhook".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_endpoints() -> BTreeMap<String, String> {
    endpoints::ALL
        .iter()
        .map(|name| (name.to_string(), name.to_string()))
        .collect()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
            api_key: None,
            endpoints: default_endpoints(),
        }
    }
}

impl ApiConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_endpoint(mut self, name: &str, path: &str) -> Self {
        self.endpoints.insert(name.to_string(), path.to_string());
        self
    }

    /// Fill in built-in endpoint names the user did not override.
    fn merge_default_endpoints(&mut self) {
        for (name, path) in default_endpoints() {
            self.endpoints.entry(name).or_insert(path);
        }
    }
}

/// Dashboard behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Periodic refresh interval; 0 disables the timer.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    #[serde(default = "default_notification_ms")]
    pub notification_ms: u64,

    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_refresh_interval() -> u64 {
    60
}

fn default_notification_ms() -> u64 {
    5000
}

fn default_recent_limit() -> usize {
    5
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
            notification_ms: default_notification_ms(),
            recent_limit: default_recent_limit(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })?;
        config.api.merge_default_endpoints();
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load from file if it exists, otherwise defaults; env overrides apply
    /// in both cases.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => Self::load(p)?,
            Some(p) => {
                tracing::warn!("Config file {:?} not found, using defaults", p);
                Config::default()
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DENTAL_BASE_URL") {
            self.api.base_url = url;
        }
        if let Ok(key) = std::env::var("DENTAL_API_KEY") {
            self.api.api_key = if key.is_empty() { None } else { Some(key) };
        }
        if let Ok(ms) = std::env::var("DENTAL_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse() {
                self.api.timeout_ms = ms;
            }
        }
        if let Ok(secs) = std::env::var("DENTAL_REFRESH_SECS") {
            if let Ok(secs) = secs.parse() {
                self.dashboard.refresh_interval_secs = secs;
            }
        }
        if let Ok(level) = std::env::var("DENTAL_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.api.base_url
            )));
        }
        if self.api.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
