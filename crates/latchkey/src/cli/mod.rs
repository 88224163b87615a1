//! cli subcommands for latchkey.
//!
//! the cli is structured as:
//! - `latchkey serve` - run the activation server
//! - `latchkey channels create|list|disable|enable` - manage channels
//! - `latchkey keys add|list` - register channel public keys
//! - `latchkey subaccounts create|list` - manage operator sub-accounts
//! - `latchkey capsules list|show|revoke` - inspect the capsule ledger
//!
//! management commands open the database directly from config; they are
//! operator provisioning tools, not an http admin surface.

mod capsules;
mod channels;
mod keys;
mod serve;
mod subaccounts;

pub use capsules::CapsulesCommand;
pub use channels::ChannelsCommand;
pub use keys::KeysCommand;
pub use serve::ServeCommand;
pub use subaccounts::SubaccountsCommand;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Context, Result};

use latchkey_db::LatchkeyDb;
use latchkey_types::{Config, DatabaseConfig};

/// latchkey - capability-gated license activation server
#[derive(Parser, Debug)]
#[command(name = "latchkey")]
#[command(about = "Capability-gated license activation server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// the selected subcommand.
    #[command(subcommand)]
    pub command: Command,
}

/// top-level commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// run the activation server
    Serve(ServeCommand),

    /// manage channels
    #[command(subcommand)]
    Channels(ChannelsCommand),

    /// register channel public keys
    #[command(subcommand)]
    Keys(KeysCommand),

    /// manage operator sub-accounts
    #[command(subcommand)]
    Subaccounts(SubaccountsCommand),

    /// inspect the capsule ledger
    #[command(subcommand)]
    Capsules(CapsulesCommand),
}

/// database selection shared by management commands.
#[derive(Args, Debug)]
pub struct DbArgs {
    /// path to config file (toml format)
    #[arg(short, long, env = "LATCHKEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// database url (sqlite:// or postgres://), overrides config
    #[arg(long, env = "LATCHKEY_DATABASE_URL")]
    pub database_url: Option<String>,
}

impl DbArgs {
    /// resolve the database config and connect.
    pub async fn connect(&self) -> Result<LatchkeyDb> {
        let mut config = serve::load_config_file(self.config.as_ref())?.unwrap_or_default();
        if let Some(url) = &self.database_url {
            config.database = parse_database_url(url)?;
        }
        LatchkeyDb::new(&config.database)
            .await
            .context("failed to connect to database")
    }
}

/// parse a database url into a database config.
pub(crate) fn parse_database_url(url: &str) -> Result<DatabaseConfig> {
    let mut config = DatabaseConfig::default();
    if let Some(rest) = url.strip_prefix("sqlite://") {
        config.db_type = "sqlite".to_string();
        config.connection_string = rest.to_string();
    } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        config.db_type = "postgres".to_string();
        config.connection_string = url.to_string();
    } else {
        // bare paths are sqlite files
        config.db_type = "sqlite".to_string();
        config.connection_string = url.to_string();
    }
    Ok(config)
}

/// look up a channel by code or fail with a readable error.
pub(crate) async fn require_channel(
    db: &LatchkeyDb,
    code: &str,
) -> Result<latchkey_types::Channel> {
    use latchkey_db::Database;
    db.get_channel_by_code(code)
        .await?
        .ok_or_else(|| color_eyre::eyre::eyre!("no channel with code {code:?}"))
}
