//! activation audit entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use latchkey_types::{ActivationAudit, AuditDecision};

/// activation audit database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activation_audits")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub channel_code: String,
    pub subaccount: Option<String>,
    pub sn: Option<String>,
    pub device_model: Option<String>,
    pub decision: String,
    pub error_code: Option<String>,
    pub device_pubkey_hash: Option<String>,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for ActivationAudit {
    fn from(model: Model) -> Self {
        ActivationAudit {
            id: model.id as u64,
            channel_code: model.channel_code,
            subaccount: model.subaccount,
            sn: model.sn,
            model: model.device_model,
            decision: model.decision.parse().unwrap_or(AuditDecision::Denied),
            error_code: model.error_code,
            device_pubkey_hash: model.device_pubkey_hash,
            detail: model.detail,
            created_at: model.created_at,
        }
    }
}

impl From<&ActivationAudit> for ActiveModel {
    fn from(audit: &ActivationAudit) -> Self {
        ActiveModel {
            id: if audit.id == 0 {
                NotSet
            } else {
                Set(audit.id as i64)
            },
            channel_code: Set(audit.channel_code.clone()),
            subaccount: Set(audit.subaccount.clone()),
            sn: Set(audit.sn.clone()),
            device_model: Set(audit.model.clone()),
            decision: Set(audit.decision.as_str().to_string()),
            error_code: Set(audit.error_code.clone()),
            device_pubkey_hash: Set(audit.device_pubkey_hash.clone()),
            detail: Set(audit.detail.clone()),
            created_at: Set(audit.created_at),
        }
    }
}
