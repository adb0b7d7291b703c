// src/errors.rs

//! Error types for node operations.

use nmx_core::NmxError;
use std::fmt;

/// Process exit code for any fatal error without a dedicated code
pub const EXIT_FAILURE: u8 = 1;

/// Process exit code when a registered invariant is broken
pub const EXIT_INVARIANT_BROKEN: u8 = 2;

/// Process exit code when an upgrade plan halts the chain
pub const EXIT_UPGRADE_NEEDED: u8 = 3;

/// Main error type for node operations
#[derive(Debug)]
pub enum NodeError {
    /// Configuration error
    ConfigError(String),

    /// Genesis file could not be used
    GenesisError(String),

    /// Fatal error returned by the application
    AppError(NmxError),

    /// Mempool error
    MempoolError(String),

    /// Node state file could not be read or written
    StateError(String),

    /// I/O error
    IoError(std::io::Error),
}

impl NodeError {
    /// Exit code the binary terminates with
    pub fn exit_code(&self) -> u8 {
        match self {
            NodeError::AppError(NmxError::InvariantBroken { .. }) => EXIT_INVARIANT_BROKEN,
            NodeError::AppError(NmxError::UpgradeNeeded { .. }) => EXIT_UPGRADE_NEEDED,
            _ => EXIT_FAILURE,
        }
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            NodeError::GenesisError(msg) => write!(f, "Genesis error: {}", msg),
            NodeError::AppError(err) => write!(f, "Application error: {}", err),
            NodeError::MempoolError(msg) => write!(f, "Mempool error: {}", msg),
            NodeError::StateError(msg) => write!(f, "Node state error: {}", msg),
            NodeError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for NodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NodeError::AppError(err) => Some(err),
            NodeError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::IoError(err)
    }
}

impl From<NmxError> for NodeError {
    fn from(err: NmxError) -> Self {
        NodeError::AppError(err)
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::StateError(err.to_string())
    }
}

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;
