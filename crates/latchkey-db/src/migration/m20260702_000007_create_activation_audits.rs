//! create activation_audits table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ActivationAudits::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActivationAudits::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ActivationAudits::ChannelCode)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActivationAudits::Subaccount).string())
                    .col(ColumnDef::new(ActivationAudits::Sn).string())
                    .col(ColumnDef::new(ActivationAudits::DeviceModel).string())
                    .col(ColumnDef::new(ActivationAudits::Decision).string().not_null())
                    .col(ColumnDef::new(ActivationAudits::ErrorCode).string())
                    .col(ColumnDef::new(ActivationAudits::DevicePubkeyHash).string())
                    .col(ColumnDef::new(ActivationAudits::Detail).string())
                    .col(
                        ColumnDef::new(ActivationAudits::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activation_audits_created_at")
                    .table(ActivationAudits::Table)
                    .col(ActivationAudits::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_activation_audits_channel_code")
                    .table(ActivationAudits::Table)
                    .col(ActivationAudits::ChannelCode)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ActivationAudits::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ActivationAudits {
    #[sea_orm(iden = "activation_audits")]
    Table,
    Id,
    ChannelCode,
    Subaccount,
    Sn,
    DeviceModel,
    Decision,
    ErrorCode,
    DevicePubkeyHash,
    Detail,
    CreatedAt,
}
