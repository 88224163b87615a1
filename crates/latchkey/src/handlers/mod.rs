//! http handlers for latchkey api endpoints.

mod activate;
mod error;
mod health;
mod key;

pub use activate::{activate, ActivateData};
pub use error::ApiError;
pub use health::health;
pub use key::key;

use serde::Serialize;

/// success envelope: `{"code": 0, "message": ..., "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    /// always 0 on success.
    pub code: u32,
    /// human-readable message.
    pub message: String,
    /// response payload.
    pub data: T,
}

impl<T> ApiOk<T> {
    /// wrap a payload in the success envelope.
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            code: 0,
            message: message.into(),
            data,
        }
    }
}
