//! Configuration for tracing and instrumentation

use serde::{Deserialize, Serialize};

/// Output format for the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, one line per event
    #[default]
    Pretty,
    /// Newline-delimited JSON
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(crate::CoreError::invalid_config(format!(
                "unknown log format '{other}'"
            ))),
        }
    }
}

/// Main instrumentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    /// Service name recorded on startup
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Log level filter (e.g., "info", "debug", "fitmarket_http=trace")
    pub log_level: String,
    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            service_name: "fitmarket".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl InstrumentationConfig {
    /// Create configuration from environment variables
    ///
    /// Supports the following environment variables:
    /// - `FITMARKET_SERVICE_NAME` or `SERVICE_NAME`: Service name
    /// - `RUST_LOG`: Log level filter
    /// - `FITMARKET_LOG_FORMAT`: `pretty` or `json`
    pub fn from_env() -> Self {
        let service_name = std::env::var("FITMARKET_SERVICE_NAME")
            .or_else(|_| std::env::var("SERVICE_NAME"))
            .unwrap_or_else(|_| "fitmarket".to_string());

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let format = std::env::var("FITMARKET_LOG_FORMAT")
            .ok()
            .and_then(|f| f.parse().ok())
            .unwrap_or_default();

        Self {
            service_name,
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level,
            format,
        }
    }

    /// Create a development configuration with sensible defaults
    pub fn dev() -> Self {
        Self {
            service_name: "fitmarket-dev".to_string(),
            service_version: "dev".to_string(),
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
        }
    }
}
