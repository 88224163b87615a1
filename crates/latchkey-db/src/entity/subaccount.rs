//! channel sub-account entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use latchkey_types::{ChannelId, ChannelStatus, SubAccount, SubAccountId};

/// sub-account database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "subaccounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub channel_id: i64,
    pub name: String,
    pub totp_secret: String,
    pub status: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
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

impl From<Model> for SubAccount {
    fn from(model: Model) -> Self {
        SubAccount {
            id: SubAccountId(model.id as u64),
            channel_id: ChannelId(model.channel_id as u64),
            name: model.name,
            totp_secret: model.totp_secret,
            status: model.status.parse().unwrap_or(ChannelStatus::Disabled),
            last_used_at: model.last_used_at,
            created_at: model.created_at,
        }
    }
}

impl From<&SubAccount> for ActiveModel {
    fn from(sub: &SubAccount) -> Self {
        ActiveModel {
            id: if sub.id.0 == 0 {
                NotSet
            } else {
                Set(sub.id.0 as i64)
            },
            channel_id: Set(sub.channel_id.0 as i64),
            name: Set(sub.name.clone()),
            totp_secret: Set(sub.totp_secret.clone()),
            status: Set(sub.status.as_str().to_string()),
            last_used_at: Set(sub.last_used_at),
            created_at: Set(sub.created_at),
        }
    }
}
