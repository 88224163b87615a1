//! channel signing key entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use latchkey_types::{ChannelId, ChannelKey, ChannelStatus, KeyAlgorithm};

/// channel key database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "channel_keys")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub channel_id: i64,
    pub kid: String,
    pub algorithm: String,
    #[sea_orm(column_type = "Text")]
    pub public_key: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub rotated_at: Option<DateTime<Utc>>,
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

impl From<Model> for ChannelKey {
    fn from(model: Model) -> Self {
        // a key with an unrecognised algorithm must never verify anything
        let (algorithm, status) = match model.algorithm.parse::<KeyAlgorithm>() {
            Ok(alg) => (
                alg,
                model.status.parse().unwrap_or(ChannelStatus::Disabled),
            ),
            Err(_) => (KeyAlgorithm::EdDsa, ChannelStatus::Disabled),
        };

        ChannelKey {
            id: model.id as u64,
            channel_id: ChannelId(model.channel_id as u64),
            kid: model.kid,
            algorithm,
            public_key: model.public_key,
            status,
            created_at: model.created_at,
            rotated_at: model.rotated_at,
        }
    }
}

impl From<&ChannelKey> for ActiveModel {
    fn from(key: &ChannelKey) -> Self {
        ActiveModel {
            id: if key.id == 0 {
                NotSet
            } else {
                Set(key.id as i64)
            },
            channel_id: Set(key.channel_id.0 as i64),
            kid: Set(key.kid.clone()),
            algorithm: Set(key.algorithm.as_str().to_string()),
            public_key: Set(key.public_key.clone()),
            status: Set(key.status.as_str().to_string()),
            created_at: Set(key.created_at),
            rotated_at: Set(key.rotated_at),
        }
    }
}
