//! Error types used throughout the optimization suite

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the optimization suite
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum OptimizerError {
    /// No connection became available within the acquire timeout.
    /// Recoverable: the caller retries or fails the triggering request.
    #[error("connection pool exhausted for '{alias}' after {waited_ms}ms")]
    PoolExhausted {
        /// Database alias whose pool ran dry
        alias: String,
        /// How long the caller waited before giving up
        waited_ms: u64,
    },

    /// Connection creation kept failing after the configured retries.
    #[error("connection pool unavailable for '{alias}': {reason}")]
    PoolUnavailable {
        /// Database alias whose pool could not be served
        alias: String,
        /// Last creation error observed
        reason: String,
    },

    /// A single connection attempt failed. Transient; retried with backoff
    /// inside the pool.
    #[error("failed to create connection for '{alias}': {reason}")]
    ConnectionCreateFailed {
        /// Database alias the connection was meant for
        alias: String,
        /// Driver-level failure description
        reason: String,
    },

    /// Index creation or partition DDL failed. Logged per item; a batch
    /// continues past it.
    #[error("DDL failed on {object}: {reason}")]
    DdlFailed {
        /// Table or index the statement targeted
        object: String,
        /// Engine-level failure description
        reason: String,
    },

    /// Schema metadata could not be read. The affected component degrades
    /// to "no suggestions this cycle" instead of aborting.
    #[error("schema introspection failed: {0}")]
    SchemaIntrospection(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for optimization suite operations
pub type Result<T> = std::result::Result<T, OptimizerError>;
