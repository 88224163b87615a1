//! channel entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use latchkey_types::{Channel, ChannelId, ChannelStatus};

/// channel database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub code: String,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::channel_key::Entity")]
    ChannelKeys,
    #[sea_orm(has_many = "super::subaccount::Entity")]
    SubAccounts,
    #[sea_orm(has_many = "super::cac_token::Entity")]
    CacTokens,
}

impl Related<super::channel_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChannelKeys.def()
    }
}

impl Related<super::subaccount::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubAccounts.def()
    }
}

impl Related<super::cac_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CacTokens.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Channel {
    fn from(model: Model) -> Self {
        Channel {
            id: ChannelId(model.id as u64),
            code: model.code,
            name: model.name,
            // an unrecognised stored status is treated as disabled
            status: model.status.parse().unwrap_or(ChannelStatus::Disabled),
            created_at: model.created_at,
        }
    }
}

impl From<&Channel> for ActiveModel {
    fn from(channel: &Channel) -> Self {
        ActiveModel {
            id: if channel.id.0 == 0 {
                NotSet
            } else {
                Set(channel.id.0 as i64)
            },
            code: Set(channel.code.clone()),
            name: Set(channel.name.clone()),
            status: Set(channel.status.as_str().to_string()),
            created_at: Set(channel.created_at),
        }
    }
}
