//! api error handling for http handlers.
//!
//! every failure serializes as `{"code": "<SYMBOLIC_CODE>", "message": ...}`
//! with an http status matched to the failure class. successful responses
//! use numeric code 0 (see [`super::ApiOk`]).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::activation::ActivationError;

/// api error type for handler responses.
#[derive(Debug)]
pub struct ApiError {
    /// http status for this failure class.
    pub status: StatusCode,
    /// symbolic wire code.
    pub code: &'static str,
    /// human-readable message.
    pub message: String,
}

impl ApiError {
    /// create an internal server error from any error type.
    pub fn internal(e: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "SERVER_ERROR",
            message: e.to_string(),
        }
    }
}

impl From<ActivationError> for ApiError {
    fn from(err: ActivationError) -> Self {
        use ActivationError as E;
        let status = match &err {
            E::MissingHeader(_) | E::EmptyBody | E::InvalidJson(_) | E::ChannelMismatch
            | E::TimestampOutOfRange => StatusCode::BAD_REQUEST,

            E::InvalidPayload(_) | E::NonceTooShort => StatusCode::UNPROCESSABLE_ENTITY,

            E::SignatureInvalid | E::SubaccountInvalid | E::TotpFailed | E::CacInvalid(_) => {
                StatusCode::UNAUTHORIZED
            }

            E::ChannelDisabled | E::ChannelKeyMissing | E::CacChannelMismatch
            | E::CacNotYetValid | E::CacExpired | E::ScopeViolation => StatusCode::FORBIDDEN,

            E::NonceReplay | E::TotpReused | E::QuotaExhausted | E::AlreadyActivated => {
                StatusCode::CONFLICT
            }

            E::KeyLoadFailed | E::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // server faults keep their detail out of the wire response
        let message = match &err {
            E::Server(detail) => {
                tracing::error!(detail = %detail, "activation server error");
                err.to_string()
            }
            _ => err.to_string(),
        };

        Self {
            status,
            code: err.code(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "code": self.code,
                "message": self.message,
            })),
        )
            .into_response()
    }
}
