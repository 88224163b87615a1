//! error type for latchkey-types.

use thiserror::Error;

/// errors produced while validating or converting domain types.
#[derive(Debug, Error)]
pub enum Error {
    /// a capsule payload was missing a required field.
    #[error("capsule payload missing required field: {0}")]
    MissingField(&'static str),

    /// a capsule quota was zero or negative.
    #[error("capsule quota max_activations must be a positive integer")]
    InvalidQuota,

    /// a status string stored in the database was not recognised.
    #[error("unknown status value: {0}")]
    UnknownStatus(String),

    /// a signing algorithm tag was not recognised.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// json (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
