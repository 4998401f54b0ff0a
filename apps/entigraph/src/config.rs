//! # Configuration
//!
//! Application settings, resolved in three layers:
//!
//! 1. Defaults, or an optional TOML file passed with `--config`
//! 2. `ENTIGRAPH_*` environment variables
//! 3. CLI flags (applied by the caller)
//!
//! ```toml
//! database = "entigraph.redb"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [api]
//! # api_key = "secret"
//! rate_limit = 100          # requests/second, 0 disables
//! # cors_origins = "https://app.example.com,https://admin.example.com"
//!
//! [log]
//! format = "text"           # or "json"
//! ```

use entigraph_core::EntigraphError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default requests per second for the rate limiter.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

/// Listener address for the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// HTTP surface security settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer key required on every route except `/health`. `None` disables auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Requests per second; 0 disables rate limiting.
    pub rate_limit: u32,
    /// Comma-separated allowed origins, or `*`. `None` means localhost only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cors_origins: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Full application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: PathBuf,
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("entigraph.redb"),
            server: ServerConfig::default(),
            api: ApiConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, EntigraphError> {
        toml::from_str(s).map_err(|e| EntigraphError::Serialization(format!("Config: {}", e)))
    }

    /// Read and parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, EntigraphError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            EntigraphError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(EntigraphError::Io(format!(
                "Config file '{}' exceeds {} bytes",
                path.display(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            EntigraphError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults or `path`, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, EntigraphError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `ENTIGRAPH_*` overrides read through `lookup`.
    ///
    /// Empty values are ignored. An unparsable rate limit or log format
    /// keeps the current value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(database) = var("ENTIGRAPH_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(key) = var("ENTIGRAPH_API_KEY") {
            self.api.api_key = Some(key);
        }
        if let Some(limit) = var("ENTIGRAPH_RATE_LIMIT") {
            match limit.trim().parse() {
                Ok(limit) => self.api.rate_limit = limit,
                Err(_) => tracing::warn!(value = %limit, "ignoring invalid ENTIGRAPH_RATE_LIMIT"),
            }
        }
        if let Some(origins) = var("ENTIGRAPH_CORS_ORIGINS") {
            self.api.cors_origins = Some(origins);
        }
        if let Some(format) = var("ENTIGRAPH_LOG_FORMAT") {
            match LogFormat::parse(&format) {
                Some(format) => self.log.format = format,
                None => tracing::warn!(value = %format, "ignoring invalid ENTIGRAPH_LOG_FORMAT"),
            }
        }
    }
}
