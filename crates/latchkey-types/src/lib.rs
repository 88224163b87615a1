//! core types for latchkey - a channel license activation server.
//!
//! this crate provides the fundamental data structures used throughout
//! latchkey:
//! - [`channel`]: reseller channel identity, signing keys and sub-accounts
//! - [`capsule`]: capability capsule (CAC) payloads and ledger records
//! - [`license`]: license claims and issued-license records
//! - [`audit`]: activation audit records
//! - [`config`]: application configuration

#![warn(missing_docs)]

mod audit;
mod capsule;
mod channel;
mod config;
mod error;
mod license;
mod nonce;
mod subaccount;

pub use audit::{ActivationAudit, AuditDecision};
pub use capsule::{
    CapsulePayload, CapsuleQuota, CapsuleRecord, CapsuleScope, CapsuleStatus,
};
pub use channel::{Channel, ChannelId, ChannelKey, ChannelStatus, KeyAlgorithm};
pub use config::{ActivationConfig, Config, DatabaseConfig};
pub use error::Error;
pub use license::{LicenseClaims, LicenseRecord, LICENSE_SCHEMA_VERSION};
pub use nonce::{Nonce, NonceError, MIN_NONCE_LEN};
pub use subaccount::{SubAccount, SubAccountId};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
