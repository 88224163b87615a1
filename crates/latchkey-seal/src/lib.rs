//! signing and verification primitives for latchkey.
//!
//! this crate owns everything cryptographic in the activation protocol:
//! - [`envelope`]: compact and detached three-segment signed envelopes
//! - [`keys`]: the platform signing keypair and channel public keys
//! - [`totp`]: time-based one-time code validation with slot reporting
//!
//! only ed25519 (`EdDSA`) is supported end-to-end. any other `alg` value
//! fails verification with an unsupported-algorithm error.

#![warn(missing_docs)]

mod envelope;
mod error;
mod keys;
mod totp;

pub use envelope::{
    decode_header, sign_compact, sign_detached, verify_compact, verify_detached, EnvelopeHeader,
    EnvelopeType, ENVELOPE_ALG,
};
pub use error::Error;
pub use keys::{channel_key_from_pem, PlatformKeys};
pub use totp::{generate_totp_secret, totp_code_at_slot, verify_totp, TotpMatch};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
