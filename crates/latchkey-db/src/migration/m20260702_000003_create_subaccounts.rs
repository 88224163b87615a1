//! create subaccounts table migration.

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
                    .table(Subaccounts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Subaccounts::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Subaccounts::ChannelId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Subaccounts::Name).string().not_null())
                    .col(ColumnDef::new(Subaccounts::TotpSecret).string().not_null())
                    .col(
                        ColumnDef::new(Subaccounts::Status)
                            .string()
                            .not_null()
                            .default("active"),
                    )
                    .col(ColumnDef::new(Subaccounts::LastUsedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Subaccounts::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_subaccounts_channel")
                            .from(Subaccounts::Table, Subaccounts::ChannelId)
                            .to(Channels::Table, Channels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_subaccounts_channel_name")
                    .table(Subaccounts::Table)
                    .col(Subaccounts::ChannelId)
                    .col(Subaccounts::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subaccounts::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Subaccounts {
    #[sea_orm(iden = "subaccounts")]
    Table,
    Id,
    ChannelId,
    Name,
    TotpSecret,
    Status,
    LastUsedAt,
    CreatedAt,
}
