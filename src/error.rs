//! Error types for POML rendering

use thiserror::Error;

/// Result type alias for POML operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering POML or serving nodes
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed markup or request input (missing root, unbalanced tags, bad mode)
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown template or node
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// External POML SDK failure
    #[error("sdk error: {0}")]
    Sdk(String),

    /// Node input did not match its declared schema
    #[error("invalid node input: {0}")]
    NodeInput(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Shorthand for a validation failure at a byte offset of the markup
    #[must_use]
    pub fn validation_at(offset: usize, message: &str) -> Self {
        Self::Validation(format!("{message} (at byte {offset})"))
    }
}
