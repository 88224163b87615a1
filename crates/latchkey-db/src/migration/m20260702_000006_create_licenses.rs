//! create licenses table migration.

use sea_orm_migration::prelude::*;

use super::m20260702_000001_create_channels::Channels;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Licenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Licenses::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Licenses::LicenseId).string().not_null())
                    .col(ColumnDef::new(Licenses::Sn).string().not_null())
                    .col(ColumnDef::new(Licenses::ChannelId).big_integer().not_null())
                    .col(ColumnDef::new(Licenses::CacJti).string().not_null())
                    .col(ColumnDef::new(Licenses::Claims).text().not_null())
                    .col(ColumnDef::new(Licenses::Envelope).text().not_null())
                    .col(
                        ColumnDef::new(Licenses::IssuedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Licenses::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Licenses::RevokedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_licenses_channel")
                            .from(Licenses::Table, Licenses::ChannelId)
                            .to(Channels::Table, Channels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_licenses_license_id")
                    .table(Licenses::Table)
                    .col(Licenses::LicenseId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // per-serial caps are enforced by counting non-revoked rows per sn
        manager
            .create_index(
                Index::create()
                    .name("idx_licenses_sn")
                    .table(Licenses::Table)
                    .col(Licenses::Sn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_licenses_cac_jti")
                    .table(Licenses::Table)
                    .col(Licenses::CacJti)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Licenses::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Licenses {
    #[sea_orm(iden = "licenses")]
    Table,
    Id,
    LicenseId,
    Sn,
    ChannelId,
    CacJti,
    Claims,
    Envelope,
    IssuedAt,
    ExpiresAt,
    RevokedAt,
}
