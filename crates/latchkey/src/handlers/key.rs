//! handler for the `/key` endpoint.
//!
//! returns the platform's license-signing public key so issued licenses
//! (and capsule countersignatures) can be verified offline.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

/// response for the `/key` endpoint.
#[derive(Debug, Serialize)]
pub struct KeyResponse {
    /// signature algorithm tag.
    pub algorithm: &'static str,
    /// key id stamped into license envelopes.
    pub kid: String,
    /// spki pem public key.
    pub public_key_pem: String,
}

/// GET /key - return the platform's license-signing public key.
pub async fn key(State(state): State<AppState>) -> Json<KeyResponse> {
    Json(KeyResponse {
        algorithm: latchkey_seal::ENVELOPE_ALG,
        kid: state.config.platform_kid.clone(),
        public_key_pem: state.public_key_pem.clone(),
    })
}
