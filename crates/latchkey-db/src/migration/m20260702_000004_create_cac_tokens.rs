//! create cac_tokens table migration.

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
                    .table(CacTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CacTokens::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(CacTokens::Jti).string().not_null())
                    .col(
                        ColumnDef::new(CacTokens::ChannelId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CacTokens::Payload).text().not_null())
                    .col(ColumnDef::new(CacTokens::QuotaMax).big_integer().not_null())
                    .col(
                        ColumnDef::new(CacTokens::QuotaUsed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(CacTokens::ValidFrom).big_integer())
                    .col(ColumnDef::new(CacTokens::ValidTo).big_integer())
                    .col(
                        ColumnDef::new(CacTokens::Scope)
                            .text()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(CacTokens::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(CacTokens::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CacTokens::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cac_tokens_channel")
                            .from(CacTokens::Table, CacTokens::ChannelId)
                            .to(Channels::Table, Channels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // jti is the capsule identity; first-sight registration relies on
        // this index to stay idempotent under concurrent sightings
        manager
            .create_index(
                Index::create()
                    .name("idx_cac_tokens_jti")
                    .table(CacTokens::Table)
                    .col(CacTokens::Jti)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_cac_tokens_channel_id")
                    .table(CacTokens::Table)
                    .col(CacTokens::ChannelId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CacTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum CacTokens {
    #[sea_orm(iden = "cac_tokens")]
    Table,
    Id,
    Jti,
    ChannelId,
    Payload,
    QuotaMax,
    QuotaUsed,
    ValidFrom,
    ValidTo,
    Scope,
    Status,
    CreatedAt,
    UpdatedAt,
}
