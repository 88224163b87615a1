//! capability capsule (cac) types.
//!
//! a capsule is a signed, quota-bearing authorization token issued to a
//! channel. the signed payload travels with the request; the ledger record
//! is the persisted, mutable counterpart that tracks quota consumption.
//! for mutable state the ledger always wins over a freshly parsed payload.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::Error;

/// lifecycle status of a capsule ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapsuleStatus {
    /// capsule may still authorize activations.
    Active,
    /// capsule was revoked by administration; no further consumption.
    Revoked,
}

impl CapsuleStatus {
    /// string form as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for CapsuleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for CapsuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// quota block of a capsule payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleQuota {
    /// maximum number of activations this capsule authorizes.
    pub max_activations: i64,

    /// unix time before which the capsule is not yet valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<i64>,

    /// unix time after which the capsule is expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_to: Option<i64>,
}

/// scope restrictions embedded in a capsule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleScope {
    /// allow-list of device model identifiers. empty means any model.
    #[serde(default)]
    pub models: Vec<String>,

    /// per-serial license cap. absent means 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_per_sn: Option<i64>,
}

impl CapsuleScope {
    /// the effective per-serial license cap.
    pub fn effective_max_per_sn(&self) -> i64 {
        self.max_per_sn.unwrap_or(1)
    }

    /// whether the given device model is permitted by this scope.
    pub fn permits_model(&self, model: &str) -> bool {
        self.models.is_empty() || self.models.iter().any(|m| m == model)
    }
}

/// the signed capsule payload.
///
/// `channel_id` carries the issuing channel's *code* (the wire name predates
/// the numeric ids used internally). `policy` is reserved and passed through
/// unvalidated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapsulePayload {
    /// capsule identity (unique token identifier).
    pub jti: String,

    /// issuing channel code.
    pub channel_id: String,

    /// quota and validity window.
    pub quota: CapsuleQuota,

    /// scope restrictions.
    #[serde(default)]
    pub scope: CapsuleScope,

    /// reserved policy block, passed through unvalidated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<serde_json::Value>,
}

impl CapsulePayload {
    /// validate the structural invariants of a freshly parsed payload.
    ///
    /// a zero or negative `max_activations` is a validation error, not an
    /// empty-quota grant.
    pub fn validate(&self) -> Result<(), Error> {
        if self.jti.is_empty() {
            return Err(Error::MissingField("jti"));
        }
        if self.channel_id.is_empty() {
            return Err(Error::MissingField("channel_id"));
        }
        if self.quota.max_activations <= 0 {
            return Err(Error::InvalidQuota);
        }
        Ok(())
    }
}

/// the persisted ledger record for a capsule.
///
/// created lazily on first sighting of a valid signed capsule; for quota
/// state and status it is authoritative over any replayed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapsuleRecord {
    /// unique identifier.
    pub id: u64,

    /// capsule identity.
    pub jti: String,

    /// owning channel.
    pub channel_id: ChannelId,

    /// the verified payload as received, serialized verbatim.
    pub payload: String,

    /// quota maximum.
    pub quota_max: i64,

    /// quota consumed so far. monotonically non-decreasing.
    pub quota_used: i64,

    /// unix time lower validity bound.
    pub valid_from: Option<i64>,

    /// unix time upper validity bound.
    pub valid_to: Option<i64>,

    /// scope restrictions.
    pub scope: CapsuleScope,

    /// lifecycle status.
    pub status: CapsuleStatus,

    /// when this record was created.
    pub created_at: DateTime<Utc>,

    /// when this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl CapsuleRecord {
    /// build a ledger record from a verified payload (first-sight
    /// registration). quota starts unconsumed.
    pub fn from_payload(channel_id: ChannelId, payload: &CapsulePayload) -> Result<Self, Error> {
        payload.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: 0,
            jti: payload.jti.clone(),
            channel_id,
            payload: serde_json::to_string(payload)?,
            quota_max: payload.quota.max_activations,
            quota_used: 0,
            valid_from: payload.quota.valid_from,
            valid_to: payload.quota.valid_to,
            scope: payload.scope.clone(),
            status: CapsuleStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    /// remaining quota.
    pub fn quota_remaining(&self) -> i64 {
        (self.quota_max - self.quota_used).max(0)
    }

    /// whether quota remains and the capsule is still active.
    pub fn is_consumable(&self) -> bool {
        self.status == CapsuleStatus::Active && self.quota_used < self.quota_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(max: i64) -> CapsulePayload {
        CapsulePayload {
            jti: "cap-1".to_string(),
            channel_id: "CH1".to_string(),
            quota: CapsuleQuota {
                max_activations: max,
                valid_from: None,
                valid_to: None,
            },
            scope: CapsuleScope::default(),
            policy: None,
        }
    }

    #[test]
    fn test_validate_accepts_positive_quota() {
        assert!(payload(1).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_quota() {
        assert!(matches!(payload(0).validate(), Err(Error::InvalidQuota)));
    }

    #[test]
    fn test_validate_rejects_missing_jti() {
        let mut p = payload(1);
        p.jti.clear();
        assert!(matches!(p.validate(), Err(Error::MissingField("jti"))));
    }

    #[test]
    fn test_quota_defaults_are_optional() {
        // a minimal wire payload parses without scope/policy/window fields
        let json = r#"{"jti":"cap-2","channel_id":"CH1","quota":{"max_activations":5}}"#;
        let p: CapsulePayload = serde_json::from_str(json).unwrap();
        p.validate().unwrap();
        assert_eq!(p.quota.max_activations, 5);
        assert!(p.scope.models.is_empty());
        assert_eq!(p.scope.effective_max_per_sn(), 1);
    }

    #[test]
    fn test_scope_permits_model() {
        let mut scope = CapsuleScope::default();
        assert!(scope.permits_model("anything"));

        scope.models = vec!["X".to_string()];
        assert!(scope.permits_model("X"));
        assert!(!scope.permits_model("Y"));
    }

    #[test]
    fn test_record_from_payload() {
        let record = CapsuleRecord::from_payload(ChannelId(3), &payload(4)).unwrap();
        assert_eq!(record.quota_max, 4);
        assert_eq!(record.quota_used, 0);
        assert_eq!(record.quota_remaining(), 4);
        assert!(record.is_consumable());
    }

    #[test]
    fn test_record_exhausted_not_consumable() {
        let mut record = CapsuleRecord::from_payload(ChannelId(3), &payload(2)).unwrap();
        record.quota_used = 2;
        assert!(!record.is_consumable());
        assert_eq!(record.quota_remaining(), 0);
    }

    #[test]
    fn test_revoked_record_not_consumable() {
        let mut record = CapsuleRecord::from_payload(ChannelId(3), &payload(2)).unwrap();
        record.status = CapsuleStatus::Revoked;
        assert!(!record.is_consumable());
    }
}
