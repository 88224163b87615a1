//! create channel_keys table migration.

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
                    .table(ChannelKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ChannelKeys::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ChannelKeys::ChannelId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ChannelKeys::Kid).string().not_null())
                    .col(
                        ColumnDef::new(ChannelKeys::Algorithm)
                            .string()
                            .not_null()
                            .default("EdDSA"),
                    )
                    .col(ColumnDef::new(ChannelKeys::PublicKey).text().not_null())
                    .col(
                        ColumnDef::new(ChannelKeys::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(
                        ColumnDef::new(ChannelKeys::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ChannelKeys::RotatedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_channel_keys_channel")
                            .from(ChannelKeys::Table, ChannelKeys::ChannelId)
                            .to(Channels::Table, Channels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // one key per (channel, kid); rotation replaces material in place
        manager
            .create_index(
                Index::create()
                    .name("idx_channel_keys_channel_kid")
                    .table(ChannelKeys::Table)
                    .col(ChannelKeys::ChannelId)
                    .col(ChannelKeys::Kid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ChannelKeys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ChannelKeys {
    #[sea_orm(iden = "channel_keys")]
    Table,
    Id,
    ChannelId,
    Kid,
    Algorithm,
    PublicKey,
    Status,
    CreatedAt,
    RotatedAt,
}
