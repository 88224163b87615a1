//! sub-account type: a named operator identity under a channel.
//!
//! sub-accounts hold the totp shared secret used to authenticate the human
//! or service operator issuing an activation request. the activation flow
//! only reads the secret and touches `last_used_at`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::channel::{ChannelId, ChannelStatus};

/// unique identifier for a sub-account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubAccountId(pub u64);

impl From<u64> for SubAccountId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// a named operator identity under a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAccount {
    /// unique identifier.
    pub id: SubAccountId,

    /// owning channel.
    pub channel_id: ChannelId,

    /// sub-account name, unique per channel (e.g. "ops1").
    pub name: String,

    /// hex-encoded totp shared secret.
    pub totp_secret: String,

    /// lifecycle status.
    pub status: ChannelStatus,

    /// when this sub-account last authenticated successfully.
    pub last_used_at: Option<DateTime<Utc>>,

    /// when this sub-account was created.
    pub created_at: DateTime<Utc>,
}

impl SubAccount {
    /// create a new active sub-account.
    pub fn new(channel_id: ChannelId, name: String, totp_secret: String) -> Self {
        Self {
            id: SubAccountId(0),
            channel_id,
            name,
            totp_secret,
            status: ChannelStatus::Active,
            last_used_at: None,
            created_at: Utc::now(),
        }
    }

    /// whether this sub-account may authenticate requests.
    pub fn is_active(&self) -> bool {
        self.status == ChannelStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_subaccount_is_active() {
        let sub = SubAccount::new(ChannelId(1), "ops1".to_string(), "00ff".to_string());
        assert!(sub.is_active());
        assert!(sub.last_used_at.is_none());
    }

    #[test]
    fn test_disabled_subaccount() {
        let mut sub = SubAccount::new(ChannelId(1), "ops1".to_string(), "00ff".to_string());
        sub.status = ChannelStatus::Disabled;
        assert!(!sub.is_active());
    }
}
