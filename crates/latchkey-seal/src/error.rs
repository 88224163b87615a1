//! error type for latchkey-seal.

use thiserror::Error;

/// errors produced by envelope, key and totp operations.
#[derive(Debug, Error)]
pub enum Error {
    /// the envelope was not three dot-joined segments.
    #[error("invalid envelope format")]
    InvalidFormat,

    /// a segment was not valid base64url.
    #[error("invalid base64url segment: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    /// the header or payload was not valid json.
    #[error("invalid envelope json: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// the `alg` header named an algorithm other than eddsa.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// the `typ` header did not match the expected envelope type.
    #[error("envelope type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// the type the caller required.
        expected: &'static str,
        /// the type found in the header (empty if absent).
        got: String,
    },

    /// the `use` header did not match the caller's expected purpose.
    #[error("envelope use mismatch")]
    UseMismatch,

    /// the signature did not verify.
    #[error("signature verification failed")]
    InvalidSignature,

    /// the detached digest did not match the supplied body bytes.
    #[error("detached payload does not match request body")]
    PayloadMismatch,

    /// key material could not be parsed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// reading or writing key files failed.
    #[error("key i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// a totp shared secret was not valid hex.
    #[error("invalid totp secret encoding")]
    InvalidTotpSecret,
}
