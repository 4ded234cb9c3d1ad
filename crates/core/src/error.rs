//! Errors shared by the client library and the CLI

/// Standard result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Failures while assembling settings from files and the environment
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A value was read but is not acceptable
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A source could not be read or did not deserialize
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

impl CoreError {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether the configuration was readable but rejected
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}
