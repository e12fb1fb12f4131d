//! Error types for the shell integration engine
//!
//! Malformed sequences never surface here: the router recovers from them
//! locally and reports them as unhandled. Only structural misuse and
//! configuration or snapshot IO failures are returned to callers.

use std::fmt;

/// Errors returned by shell integration operations
#[derive(Debug)]
pub enum ShellIntegrationError {
    /// Operation requires a terminal handle but `activate` was never called
    NotActivated(&'static str),

    /// IO error (config or snapshot files)
    IoError(std::io::Error),

    /// JSON serialization/deserialization error
    SerializationError(serde_json::Error),

    /// Configuration could not be parsed
    ConfigError(String),
}

impl fmt::Display for ShellIntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellIntegrationError::NotActivated(operation) => {
                write!(f, "Cannot {} before shell integration is activated", operation)
            }
            ShellIntegrationError::IoError(err) => write!(f, "IO error: {}", err),
            ShellIntegrationError::SerializationError(err) => {
                write!(f, "Serialization error: {}", err)
            }
            ShellIntegrationError::ConfigError(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ShellIntegrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShellIntegrationError::IoError(err) => Some(err),
            ShellIntegrationError::SerializationError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ShellIntegrationError {
    fn from(err: std::io::Error) -> Self {
        ShellIntegrationError::IoError(err)
    }
}

impl From<serde_json::Error> for ShellIntegrationError {
    fn from(err: serde_json::Error) -> Self {
        ShellIntegrationError::SerializationError(err)
    }
}

impl From<serde_yaml::Error> for ShellIntegrationError {
    fn from(err: serde_yaml::Error) -> Self {
        ShellIntegrationError::ConfigError(err.to_string())
    }
}

/// Result type for shell integration operations
pub type Result<T> = std::result::Result<T, ShellIntegrationError>;
