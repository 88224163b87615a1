//! license claim set and issued-license record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;

/// fixed schema version embedded in every issued license.
pub const LICENSE_SCHEMA_VERSION: u32 = 1;

/// the claim set signed into a license envelope.
///
/// verifiable offline given the platform public key. `cac_jti` links the
/// license back to the capsule that authorized it, for later correlation
/// and revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseClaims {
    /// generated license identifier (e.g. "LIC-260806-042137").
    pub license_id: String,

    /// device serial number.
    pub sn: String,

    /// issuing channel code.
    pub channel: String,

    /// sub-account that performed the activation.
    pub subaccount: String,

    /// the device's public key, as submitted.
    pub device_pubkey: String,

    /// declared device model.
    pub model: String,

    /// declared firmware hash.
    pub fw_hash: String,

    /// identity of the capsule whose quota was consumed.
    pub cac_jti: String,

    /// issued-at, unix time.
    pub iat: i64,

    /// expires-at, unix time.
    pub exp: i64,

    /// claim schema version.
    pub version: u32,
}

/// an issued license as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// unique identifier.
    pub id: u64,

    /// generated license identifier.
    pub license_id: String,

    /// device serial number.
    pub sn: String,

    /// issuing channel.
    pub channel_id: ChannelId,

    /// capsule that authorized this license.
    pub cac_jti: String,

    /// the claim set, serialized as json.
    pub claims: String,

    /// the full signed envelope string.
    pub envelope: String,

    /// when the license was issued.
    pub issued_at: DateTime<Utc>,

    /// when the license expires.
    pub expires_at: DateTime<Utc>,

    /// when the license was revoked, if ever.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl LicenseRecord {
    /// whether this license still counts against per-serial caps.
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serde_roundtrip() {
        let claims = LicenseClaims {
            license_id: "LIC-260806-000001".to_string(),
            sn: "SN-001".to_string(),
            channel: "CH1".to_string(),
            subaccount: "ops1".to_string(),
            device_pubkey: "pk".to_string(),
            model: "X".to_string(),
            fw_hash: "deadbeef".to_string(),
            cac_jti: "cap-1".to_string(),
            iat: 1_700_000_000,
            exp: 1_731_536_000,
            version: LICENSE_SCHEMA_VERSION,
        };
        let json = serde_json::to_string(&claims).unwrap();
        let parsed: LicenseClaims = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.license_id, claims.license_id);
        assert_eq!(parsed.exp, claims.exp);
        assert_eq!(parsed.version, 1);
    }
}
