//! channel types representing a reseller identity.
//!
//! a channel is a reseller that activates devices on behalf of the platform.
//! channels authenticate with registered ed25519 public keys (multiple keys
//! may coexist for rotation) and operate through named sub-accounts.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;

/// unique identifier for a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl From<u64> for ChannelId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// lifecycle status of a channel.
///
/// activation only proceeds for `active` channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    /// channel may activate devices.
    Active,
    /// channel is disabled; all activation attempts are rejected.
    Disabled,
}

impl ChannelStatus {
    /// string form as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Disabled => "disabled",
        }
    }
}

impl FromStr for ChannelStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "disabled" => Ok(Self::Disabled),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ChannelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// a reseller channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    /// unique identifier.
    pub id: ChannelId,

    /// stable channel code (e.g. "CH1"). unique.
    pub code: String,

    /// human-readable display name.
    pub name: String,

    /// lifecycle status.
    pub status: ChannelStatus,

    /// when the channel was created.
    pub created_at: DateTime<Utc>,
}

impl Channel {
    /// create a new active channel with the given code and name.
    pub fn new(id: ChannelId, code: String, name: String) -> Self {
        Self {
            id,
            code,
            name,
            status: ChannelStatus::Active,
            created_at: Utc::now(),
        }
    }

    /// whether this channel may activate devices.
    pub fn is_active(&self) -> bool {
        self.status == ChannelStatus::Active
    }
}

/// signing algorithm for a channel key.
///
/// only eddsa over curve25519 is supported end-to-end; anything else fails
/// verification rather than degrading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAlgorithm {
    /// ed25519 (the only supported algorithm).
    #[serde(rename = "EdDSA")]
    EdDsa,
}

impl KeyAlgorithm {
    /// string form as stored in the database and in envelope headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EdDsa => "EdDSA",
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EdDSA" => Ok(Self::EdDsa),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// a named public key registered for a channel.
///
/// keys are provisioned out of band; the activation flow only reads them.
/// several keys per channel may coexist so channels can rotate without
/// downtime, but only `active` keys verify requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelKey {
    /// unique identifier.
    pub id: u64,

    /// owning channel.
    pub channel_id: ChannelId,

    /// key identifier, unique per channel (e.g. "k1").
    pub kid: String,

    /// signing algorithm tag.
    pub algorithm: KeyAlgorithm,

    /// pem-encoded public key material (spki).
    pub public_key: String,

    /// lifecycle status.
    pub status: ChannelStatus,

    /// when the key was registered.
    pub created_at: DateTime<Utc>,

    /// when the key material was last replaced.
    pub rotated_at: Option<DateTime<Utc>>,
}

impl ChannelKey {
    /// create a new active key record.
    pub fn new(channel_id: ChannelId, kid: String, public_key: String) -> Self {
        Self {
            id: 0,
            channel_id,
            kid,
            algorithm: KeyAlgorithm::EdDsa,
            public_key,
            status: ChannelStatus::Active,
            created_at: Utc::now(),
            rotated_at: None,
        }
    }

    /// whether this key may be used to verify requests.
    pub fn is_usable(&self) -> bool {
        self.status == ChannelStatus::Active
    }
}
