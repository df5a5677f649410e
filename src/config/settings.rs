use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::utils::constants::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SAFETY_MARGIN_SECS};

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SettingsConfig {
    /// applies to every outbound HTTP call
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// bound on one target's whole unit (token, publish, refresh, retry)
    /// invariant: >= request_timeout_seconds
    pub dispatch_deadline_seconds: Option<u64>,
    pub safety_margin_seconds: Option<u64>,
    /// where downloaded images live until their dispatch ends
    pub temp_dir: Option<String>,
    /// caption for images sent without any text
    #[serde(default)]
    pub default_caption: String,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub server: Option<ServerConfig>,
    pub logging: Option<LoggingConfig>,
}

impl SettingsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn dispatch_deadline(&self) -> Duration {
        // two attempts of up to two calls each, plus the refresh grant
        Duration::from_secs(
            self.dispatch_deadline_seconds
                .unwrap_or(self.request_timeout_seconds.saturating_mul(5)),
        )
    }

    pub fn safety_margin_seconds(&self) -> u64 {
        self.safety_margin_seconds.unwrap_or(DEFAULT_SAFETY_MARGIN_SECS)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .as_ref()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { path: default_metrics_path(), is_enabled: false }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: String
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info".to_owned(), LogFormat::Compact)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
