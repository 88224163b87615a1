//! create activation_requests table migration.

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
                    .table(ActivationRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivationRequests::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ActivationRequests::ChannelId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActivationRequests::Kind).string().not_null())
                    .col(ColumnDef::new(ActivationRequests::Token).string().not_null())
                    .col(ColumnDef::new(ActivationRequests::Subaccount).string())
                    .col(ColumnDef::new(ActivationRequests::Iat).big_integer().not_null())
                    .col(
                        ColumnDef::new(ActivationRequests::ExpiresAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActivationRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_activation_requests_channel")
                            .from(ActivationRequests::Table, ActivationRequests::ChannelId)
                            .to(Channels::Table, Channels::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // both suppression axes share this index: (channel, kind, token)
        manager
            .create_index(
                Index::create()
                    .name("idx_activation_requests_channel_kind_token")
                    .table(ActivationRequests::Table)
                    .col(ActivationRequests::ChannelId)
                    .col(ActivationRequests::Kind)
                    .col(ActivationRequests::Token)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // for external garbage collection of expired rows
        manager
            .create_index(
                Index::create()
                    .name("idx_activation_requests_expires_at")
                    .table(ActivationRequests::Table)
                    .col(ActivationRequests::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivationRequests::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ActivationRequests {
    #[sea_orm(iden = "activation_requests")]
    Table,
    Id,
    ChannelId,
    Kind,
    Token,
    Subaccount,
    Iat,
    ExpiresAt,
    CreatedAt,
}
