//! error types for the latchkey database layer.

use thiserror::Error;

/// errors produced by database operations.
#[derive(Debug, Error)]
pub enum Error {
    /// failed to connect to the database.
    #[error("database connection error: {0}")]
    Connection(String),

    /// failed to run migrations.
    #[error("migration error: {0}")]
    Migration(String),

    /// an underlying sea-orm error.
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// stored data could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// json (de)serialization failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// errors produced by the activation commit unit.
///
/// the replay and quota variants are protocol rejections detected inside
/// the transaction (nothing was written); [`CommitError::Db`] is an
/// infrastructure fault after which a retry with the same nonce and code
/// is unsafe.
#[derive(Debug, Error)]
pub enum CommitError {
    /// the nonce row was already present and still valid.
    #[error("nonce already used within the suppression window")]
    NonceReplay,

    /// the totp slot hash was already present and still valid.
    #[error("one-time code already used for this time slot")]
    TotpReused,

    /// the capsule had no quota left (or was revoked) at commit time.
    #[error("capsule quota exhausted")]
    QuotaExhausted,

    /// the transaction failed; everything was rolled back.
    #[error(transparent)]
    Db(#[from] Error),
}

impl From<sea_orm::DbErr> for CommitError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Db(Error::Database(err))
    }
}
