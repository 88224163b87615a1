//! activation audit record.
//!
//! every activation attempt, approved or denied, leaves an append-only
//! audit row. device public keys are never stored raw - only a one-way
//! hash, so attempts can be correlated without key disclosure.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// the outcome recorded for an activation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditDecision {
    /// the request was approved and a license issued.
    Approved,
    /// the request was denied; `error_code` names the reason.
    Denied,
}

impl AuditDecision {
    /// string form as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Denied => "denied",
        }
    }
}

impl std::str::FromStr for AuditDecision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for AuditDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// append-only record of an activation decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationAudit {
    /// unique identifier.
    pub id: u64,

    /// channel code from the request, if it got that far.
    pub channel_code: String,

    /// sub-account from the request, if present.
    pub subaccount: Option<String>,

    /// device serial from the request, if present.
    pub sn: Option<String>,

    /// declared device model, if present.
    pub model: Option<String>,

    /// the decision.
    pub decision: AuditDecision,

    /// symbolic error code for denials.
    pub error_code: Option<String>,

    /// sha-256 hash (hex) of the submitted device public key.
    pub device_pubkey_hash: Option<String>,

    /// free-form detail (e.g. license id on approval).
    pub detail: Option<String>,

    /// when the attempt was recorded.
    pub created_at: DateTime<Utc>,
}

impl ActivationAudit {
    /// create an approval record.
    pub fn approved(channel_code: String, subaccount: String, sn: String) -> Self {
        Self {
            id: 0,
            channel_code,
            subaccount: Some(subaccount),
            sn: Some(sn),
            model: None,
            decision: AuditDecision::Approved,
            error_code: None,
            device_pubkey_hash: None,
            detail: None,
            created_at: Utc::now(),
        }
    }

    /// create a denial record with the symbolic error code.
    pub fn denied(channel_code: String, error_code: String) -> Self {
        Self {
            id: 0,
            channel_code,
            subaccount: None,
            sn: None,
            model: None,
            decision: AuditDecision::Denied,
            error_code: Some(error_code),
            device_pubkey_hash: None,
            detail: None,
            created_at: Utc::now(),
        }
    }
}
