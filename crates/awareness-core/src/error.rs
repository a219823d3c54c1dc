use thiserror::Error;

/// Top-level error type for the Awareness platform.
#[derive(Error, Debug)]
pub enum AwarenessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for AwarenessError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
