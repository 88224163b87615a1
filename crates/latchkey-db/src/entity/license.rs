//! issued-license entity for database storage.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::NotSet, Set};

use latchkey_types::{ChannelId, LicenseRecord};

/// license database model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "licenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub license_id: String,
    pub sn: String,
    pub channel_id: i64,
    pub cac_jti: String,
    #[sea_orm(column_type = "Text")]
    pub claims: String,
    #[sea_orm(column_type = "Text")]
    pub envelope: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
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

impl From<Model> for LicenseRecord {
    fn from(model: Model) -> Self {
        LicenseRecord {
            id: model.id as u64,
            license_id: model.license_id,
            sn: model.sn,
            channel_id: ChannelId(model.channel_id as u64),
            cac_jti: model.cac_jti,
            claims: model.claims,
            envelope: model.envelope,
            issued_at: model.issued_at,
            expires_at: model.expires_at,
            revoked_at: model.revoked_at,
        }
    }
}

impl From<&LicenseRecord> for ActiveModel {
    fn from(license: &LicenseRecord) -> Self {
        ActiveModel {
            id: if license.id == 0 {
                NotSet
            } else {
                Set(license.id as i64)
            },
            license_id: Set(license.license_id.clone()),
            sn: Set(license.sn.clone()),
            channel_id: Set(license.channel_id.0 as i64),
            cac_jti: Set(license.cac_jti.clone()),
            claims: Set(license.claims.clone()),
            envelope: Set(license.envelope.clone()),
            issued_at: Set(license.issued_at),
            expires_at: Set(license.expires_at),
            revoked_at: Set(license.revoked_at),
        }
    }
}
