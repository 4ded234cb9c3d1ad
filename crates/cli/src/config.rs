//! CLI settings: client configuration plus where the session lives

use anyhow::{Context, Result};
use fitmarket_http::{ApiClient, ClientConfig, FileStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::terminal::{TerminalIndicator, TerminalNavigator};

/// Fallback when the platform has no data directory
const LOCAL_SESSION_FILE: &str = ".fitmarket/session.json";

#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub session_file: PathBuf,
}

impl Settings {
    /// Resolve settings from the config file, the environment and command-line overrides
    pub fn load(
        config_file: Option<&Path>,
        session_file: Option<PathBuf>,
        base_url: Option<String>,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        let mut client = ClientConfig::load(config_file).with_context(|| match config_file {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;

        if let Some(url) = base_url {
            client.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = timeout_secs {
            client.timeout_secs = secs;
        }
        client.validate().context("Invalid command-line override")?;

        let session_file = session_file
            .or_else(FileStore::default_path)
            .unwrap_or_else(|| PathBuf::from(LOCAL_SESSION_FILE));

        Ok(Self {
            client,
            session_file,
        })
    }

    /// Build an API client backed by the session file
    pub fn build_client(&self) -> Result<ApiClient> {
        let store = FileStore::open(&self.session_file).with_context(|| {
            format!(
                "Failed to open session file {}",
                self.session_file.display()
            )
        })?;

        ApiClient::builder()
            .config(self.client.clone())
            .session_store(Arc::new(store))
            .navigator(Arc::new(TerminalNavigator))
            .loading_indicator(Arc::new(TerminalIndicator::new()))
            .build()
            .context("Failed to build API client")
    }
}
