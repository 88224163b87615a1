//! database migrations for latchkey.

pub use sea_orm_migration::prelude::*;

mod m20260702_000001_create_channels;
mod m20260702_000002_create_channel_keys;
mod m20260702_000003_create_subaccounts;
mod m20260702_000004_create_cac_tokens;
mod m20260702_000005_create_activation_requests;
mod m20260702_000006_create_licenses;
mod m20260702_000007_create_activation_audits;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260702_000001_create_channels::Migration),
            Box::new(m20260702_000002_create_channel_keys::Migration),
            Box::new(m20260702_000003_create_subaccounts::Migration),
            Box::new(m20260702_000004_create_cac_tokens::Migration),
            Box::new(m20260702_000005_create_activation_requests::Migration),
            Box::new(m20260702_000006_create_licenses::Migration),
            Box::new(m20260702_000007_create_activation_audits::Migration),
        ]
    }
}
