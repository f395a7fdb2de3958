//! Typed gateway configuration
//!
//! Loaded from a JSON5 file with environment-variable overrides and
//! per-field defaults. The file path is resolved from the CLI `--config`
//! flag, the `TRUSTLENS_CONFIG` environment variable, or a
//! `trustlens.json5` file in the working directory, in that order. A
//! missing file is not an error; defaults apply.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "trustlens.json5";

/// Environment variable naming an explicit config file path.
pub const CONFIG_PATH_ENV: &str = "TRUSTLENS_CONFIG";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {var}: {value}")]
    EnvOverride { var: String, value: String },
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,

    /// Upload intake and scratch storage configuration.
    pub uploads: UploadsConfig,

    /// Deepfake detection vendor configuration.
    pub detection: DetectionConfig,

    /// Job-posting fraud analysis configuration.
    pub jobscan: JobscanConfig,

    /// Self-hosted ML microservice configuration (proxy strategy).
    pub ml_service: MlServiceConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// HTTP server bind configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Upload intake configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadsConfig {
    /// Scratch directory for uploaded media pending forwarding.
    pub dir: PathBuf,
    /// Maximum accepted upload size in bytes.
    pub max_file_size: u64,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            max_file_size: 50 * 1024 * 1024,
        }
    }
}

/// Which deepfake-detection vendor to forward media to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStrategy {
    /// Call the Reality Defender REST API directly.
    RealityDefender,
    /// Re-stream uploads to the self-hosted ML microservice.
    MlService,
}

/// Deepfake detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionConfig {
    /// Selected vendor strategy.
    pub strategy: DetectionStrategy,
    /// Reality Defender client settings (direct strategy).
    pub reality_defender: RealityDefenderConfig,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            strategy: DetectionStrategy::MlService,
            reality_defender: RealityDefenderConfig::default(),
        }
    }
}

/// Reality Defender API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealityDefenderConfig {
    /// API key; also settable via `REALITY_DEFENDER_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Interval between result polls, in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of result polls before giving up.
    pub max_polls: u32,
}

impl Default for RealityDefenderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::detect::reality_defender::DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 3000,
            max_polls: 20,
        }
    }
}

/// Which analyzer to forward job postings to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobscanStrategy {
    /// Prompt the Gemini generative API directly.
    Gemini,
    /// Forward the JSON body to the self-hosted ML microservice.
    MlService,
}

/// Job-posting fraud analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JobscanConfig {
    /// Selected analyzer strategy.
    pub strategy: JobscanStrategy,
    /// Gemini client settings (direct strategy).
    pub gemini: GeminiConfig,
}

impl Default for JobscanConfig {
    fn default() -> Self {
        Self {
            strategy: JobscanStrategy::MlService,
            gemini: GeminiConfig::default(),
        }
    }
}

/// Gemini generative API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeminiConfig {
    /// API key; also settable via `GEMINI_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// API base URL.
    pub base_url: String,
    /// Model used for fraud analysis.
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: crate::jobscan::gemini::DEFAULT_BASE_URL.to_string(),
            model: crate::jobscan::gemini::DEFAULT_MODEL.to_string(),
        }
    }
}

/// Self-hosted ML microservice settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MlServiceConfig {
    /// Base URL of the microservice; also settable via `ML_SERVICE_URL`.
    pub url: String,
    /// Request timeout in seconds for analysis calls.
    pub timeout_secs: u64,
}

impl Default for MlServiceConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:5000".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Log level filter (tracing `EnvFilter` syntax).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line format.
    #[default]
    Text,
    /// Structured JSON, one object per line.
    Json,
}

impl Config {
    /// Load configuration, resolving the file path and applying
    /// environment-variable overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_config_path(explicit_path) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Parse a JSON5 config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        json5::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply environment-variable overrides from the given lookup.
    ///
    /// Separated from `load` so tests can supply variables without touching
    /// the process environment.
    pub fn apply_env(
        &mut self,
        get: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = get("PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::EnvOverride {
                var: "PORT".to_string(),
                value: port,
            })?;
        }
        if let Some(url) = get("ML_SERVICE_URL") {
            self.ml_service.url = url;
        }
        if let Some(key) = get("REALITY_DEFENDER_API_KEY") {
            self.detection.reality_defender.api_key = Some(key);
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            self.jobscan.gemini.api_key = Some(key);
        }
        Ok(())
    }
}

/// Resolve which config file to read, if any: explicit flag, then
/// `TRUSTLENS_CONFIG`, then `trustlens.json5` in the working directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.exists().then_some(default)
}
