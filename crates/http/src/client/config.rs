//! Client configuration

use fitmarket_core::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "FITMARKET";

/// Settings for [`super::ApiClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Backend base URL, without a trailing slash
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Path of the token-refresh endpoint
    pub refresh_path: String,

    /// Path of the login endpoint
    pub login_path: String,

    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
            refresh_path: "/api/token/refresh/".to_string(),
            login_path: "/api/token/".to_string(),
            user_agent: concat!("fitmarket-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    /// Request timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load configuration from an optional file and the environment
    ///
    /// Precedence, lowest first: defaults, the file, `FITMARKET_*` variables
    /// (e.g. `FITMARKET_BASE_URL`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, a value has the wrong type,
    /// or [`Self::validate`] rejects the result
    pub fn load(path: Option<&Path>) -> CoreResult<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`Self::load`], reading `FITMARKET_*` variables from `env`
    /// instead of the process environment when it is given
    fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> CoreResult<Self> {
        let defaults = Self::default();

        let mut builder = config::Config::builder()
            .set_default("base_url", defaults.base_url)?
            .set_default("timeout_secs", defaults.timeout_secs)?
            .set_default("refresh_path", defaults.refresh_path)?
            .set_default("login_path", defaults.login_path)?
            .set_default("user_agent", defaults.user_agent)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let mut loaded: Self = settings.try_deserialize()?;
        loaded.base_url = loaded.base_url.trim_end_matches('/').to_string();
        loaded.validate()?;
        Ok(loaded)
    }

    /// Check values the type system cannot
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(CoreError::invalid_config(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(CoreError::invalid_config("timeout_secs must be positive"));
        }
        for (name, path) in [
            ("refresh_path", &self.refresh_path),
            ("login_path", &self.login_path),
        ] {
            if !path.starts_with('/') {
                return Err(CoreError::invalid_config(format!(
                    "{name} must start with '/', got '{path}'"
                )));
            }
        }
        Ok(())
    }
}
