//! Error types for Slipway

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using SlipwayError
pub type Result<T> = std::result::Result<T, SlipwayError>;

/// Main error type for Slipway operations
#[derive(Debug, Error)]
pub enum SlipwayError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Project discovery errors
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Content fingerprint errors
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// External tool invocation errors
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required parameter
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// No default chart mapped for an application type
    #[error("No default chart is known for the '{0}' application type")]
    NoChartForAppType(String),
}

/// Project discovery errors
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid glob pattern
    #[error("Invalid project pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// IO error while scanning
    #[error("IO error during discovery: {0}")]
    Io(#[from] std::io::Error),
}

/// Content fingerprint errors
#[derive(Debug, Error)]
pub enum FingerprintError {
    /// Input path is neither a file nor a directory
    #[error("File or directory {0} does not exist")]
    PathNotFound(PathBuf),

    /// IO error while hashing
    #[error("IO error while hashing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// External tool invocation errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool could not be started
    #[error("Failed to spawn '{command}': {reason}")]
    SpawnFailed { command: String, reason: String },

    /// The tool exited with a non-zero status
    #[error("Command '{command}' exited with code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },
}

impl SlipwayError {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}
