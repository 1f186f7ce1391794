//! Error types shared by the contract model, the server and the registry.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Failure to turn contract text into a [`Contract`](crate::model::Contract).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    #[error("Contract is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("Contract is missing required field '{0}'")]
    MissingField(String),
    #[error("Contract field '{path}' is invalid: {message}")]
    InvalidField { path: String, message: String },
    #[error("Cannot merge contracts: {0}")]
    MergeConflict(String),
}

impl ContractError {
    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        ContractError::InvalidField {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A malformed structural path expression such as `$.items[*.id`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid path expression '{expression}': {reason}")]
pub struct PathError {
    pub expression: String,
    pub reason: String,
}

/// Errors raised while creating, querying or cleaning up mock servers.
#[derive(Debug, thiserror::Error)]
pub enum MockServerError {
    #[error(transparent)]
    ContractParse(#[from] ContractError),
    #[error("Invalid bind address '{0}'")]
    InvalidAddress(String),
    #[error("Failed to bind {0}: {1}")]
    Bind(SocketAddr, String),
    #[error("Port {0} is already in use by another mock server")]
    PortInUse(u16),
    #[error("No mock server running on port {0}")]
    NotFound(u16),
    #[error("Mock server runtime error: {0}")]
    Runtime(String),
    #[error("Failed to write pact file {}: {message}", path.display())]
    WritePact { path: PathBuf, message: String },
}

impl MockServerError {
    /// Negative status code reported across the foreign boundary.
    pub fn error_code(&self) -> i32 {
        match self {
            MockServerError::ContractParse(_) => -2,
            MockServerError::Bind(..) | MockServerError::PortInUse(_) => -3,
            MockServerError::Runtime(_) | MockServerError::WritePact { .. } => -3,
            MockServerError::InvalidAddress(_) => -5,
            MockServerError::NotFound(_) => -1,
        }
    }
}
