//! Error types for membridge

use thiserror::Error;

/// Result type alias for membridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for membridge
///
/// Every tool handler converts these into the uniform response envelope;
/// none of them may escape to the protocol layer.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("No current project: {0}")]
    NoCurrentProject(String),

    #[error("No project available: {0}")]
    NoProjectAvailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend rejected operation: {0}")]
    Upstream(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for BridgeError {
    /// Classify body-decoding failures as `Parse`; anything else from the
    /// HTTP layer happened before a usable response existed, so `Network`.
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            BridgeError::Parse(err.to_string())
        } else {
            BridgeError::Network(err.to_string())
        }
    }
}

impl BridgeError {
    /// Get error code for the MCP protocol
    pub fn code(&self) -> i64 {
        match self {
            BridgeError::Validation(_) => -32602,
            BridgeError::NotFound(_) => -32001,
            BridgeError::NoCurrentProject(_) | BridgeError::NoProjectAvailable(_) => -32002,
            BridgeError::Network(_) => -32003,
            _ => -32000,
        }
    }
}
