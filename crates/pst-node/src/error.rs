//! Error types for the node layer.

use pst_codec::FormatError;
use thiserror::Error;

/// Errors that can occur in node operations.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Codec error: {0}")]
    Codec(#[from] FormatError),

    #[error("Cluster did not form: expected {expected} members, observed {observed}")]
    ClusterNotFormed { expected: usize, observed: usize },

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Replication to {node} failed: {reason}")]
    ReplicationFailed { node: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, NodeError>;
