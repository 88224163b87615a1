//! replay-suppression entity for database storage.
//!
//! one table carries both suppression axes, distinguished by `kind`:
//! - `nonce`: token is the caller-chosen request nonce
//! - `totp`: token is the hash derived from the accepted totp slot
//!
//! rows are write-once within their validity window and never proactively
//! deleted; garbage collection is an external housekeeping concern.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// replay-suppression database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "activation_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub channel_id: i64,
    pub kind: String,
    pub token: String,
    pub subaccount: Option<String>,
    /// the issue time claimed by the request
    pub iat: i64,
    pub expires_at: DateTime<Utc>,
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
