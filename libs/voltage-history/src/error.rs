//! Error types for voltage-history
//!
//! Only install-time configuration problems and misuse of the host surface
//! are reported through [`HistoryError`]. History reads carry their failures
//! in-band as a [`StatusCode`](crate::StatusCode).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Historical data node already installed on {node_id}")]
    AlreadyInstalled { node_id: String },

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node already exists: {0}")]
    DuplicateNode(String),

    #[error("Data type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Unknown HA Configuration attribute: {0}")]
    UnknownAttribute(String),

    #[error("Configuration load error: {0}")]
    Config(#[from] figment::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HistoryError {
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;
