//! handler for the `POST /api/v1/activate` endpoint.
//!
//! the body is taken as raw [`Bytes`], not `Json<...>`: the detached
//! channel signature covers the exact bytes on the wire, so the handler
//! must hand the orchestrator the body before any parsing touches it.

use axum::{extract::State, http::HeaderMap, Json};
use bytes::Bytes;
use serde::Serialize;

use super::{ApiError, ApiOk};
use crate::activation::{self, RequestAuth};
use crate::AppState;

/// x-channel-id: the channel code.
pub const HEADER_CHANNEL_ID: &str = "x-channel-id";
/// x-channel-kid: which registered channel key signed the request.
pub const HEADER_CHANNEL_KID: &str = "x-channel-kid";
/// x-channel-signature: detached envelope over the raw body.
pub const HEADER_CHANNEL_SIGNATURE: &str = "x-channel-signature";

/// success payload of an activation.
#[derive(Debug, Serialize)]
pub struct ActivateData {
    /// generated license identifier.
    pub license_id: String,
    /// full signed license envelope, verifiable offline.
    pub license_jws: String,
    /// license expiry, unix seconds.
    pub expires_at: i64,
    /// quota left on the capsule.
    pub quota_remaining: i64,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// POST /api/v1/activate - the capability-gated activation endpoint.
pub async fn activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiOk<ActivateData>>, ApiError> {
    let auth = RequestAuth {
        channel_id: header(&headers, HEADER_CHANNEL_ID),
        kid: header(&headers, HEADER_CHANNEL_KID),
        signature: header(&headers, HEADER_CHANNEL_SIGNATURE),
    };

    let outcome = activation::process(&state, auth, &body).await?;

    Ok(Json(ApiOk::new(
        "activated",
        ActivateData {
            license_id: outcome.license_id,
            license_jws: outcome.license_jws,
            expires_at: outcome.expires_at,
            quota_remaining: outcome.quota_remaining,
        },
    )))
}
