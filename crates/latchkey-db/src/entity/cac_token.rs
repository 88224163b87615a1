//! capability capsule ledger entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use latchkey_types::{CapsuleRecord, CapsuleStatus, ChannelId};

/// capsule ledger database model.
///
/// `payload` keeps the verified signed payload verbatim; `quota_used` is the
/// only column the activation flow mutates.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "cac_tokens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub jti: String,
    pub channel_id: i64,
    #[sea_orm(column_type = "Text")]
    pub payload: String,
    pub quota_max: i64,
    pub quota_used: i64,
    pub valid_from: Option<i64>,
    pub valid_to: Option<i64>,
    /// json-serialized capsulescope
    #[sea_orm(column_type = "Text")]
    pub scope: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::channel::Entity",
        from = "Column::ChannelId",
        to = "super::channel::Column::Id"
    )]
    Channel,
}

impl Related<super::channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for CapsuleRecord {
    fn from(model: Model) -> Self {
        CapsuleRecord {
            id: model.id as u64,
            jti: model.jti,
            channel_id: ChannelId(model.channel_id as u64),
            payload: model.payload,
            quota_max: model.quota_max,
            quota_used: model.quota_used,
            valid_from: model.valid_from,
            valid_to: model.valid_to,
            scope: serde_json::from_str(&model.scope).unwrap_or_default(),
            // an unrecognised stored status blocks consumption
            status: model.status.parse().unwrap_or(CapsuleStatus::Revoked),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<&CapsuleRecord> for ActiveModel {
    fn from(record: &CapsuleRecord) -> Self {
        let scope_json =
            serde_json::to_string(&record.scope).unwrap_or_else(|_| "{}".to_string());

        ActiveModel {
            id: if record.id == 0 {
                NotSet
            } else {
                Set(record.id as i64)
            },
            jti: Set(record.jti.clone()),
            channel_id: Set(record.channel_id.0 as i64),
            payload: Set(record.payload.clone()),
            quota_max: Set(record.quota_max),
            quota_used: Set(record.quota_used),
            valid_from: Set(record.valid_from),
            valid_to: Set(record.valid_to),
            scope: Set(scope_json),
            status: Set(record.status.as_str().to_string()),
            created_at: Set(record.created_at),
            updated_at: Set(record.updated_at),
        }
    }
}
