//! the `keys` subcommand - register channel public keys.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use color_eyre::eyre::{Context, Result};

use latchkey_db::Database;
use latchkey_types::ChannelKey;

use super::{require_channel, DbArgs};

/// register channel public keys
#[derive(Subcommand, Debug)]
pub enum KeysCommand {
    /// register (or rotate) a channel public key
    Add(AddArgs),

    /// list keys registered for a channel
    List(ListArgs),
}

/// register a channel public key
#[derive(Args, Debug)]
pub struct AddArgs {
    #[command(flatten)]
    db: DbArgs,

    /// channel code
    channel: String,

    /// key id (unique per channel, e.g. "k1")
    kid: String,

    /// path to the spki pem public key file
    #[arg(long)]
    public_key_file: PathBuf,
}

/// list channel keys
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    db: DbArgs,

    /// channel code
    channel: String,
}

impl KeysCommand {
    /// run the keys command
    pub async fn run(self) -> Result<()> {
        match self {
            KeysCommand::Add(args) => add_key(args).await,
            KeysCommand::List(args) => list_keys(args).await,
        }
    }
}

async fn add_key(args: AddArgs) -> Result<()> {
    let db = args.db.connect().await?;
    let channel = require_channel(&db, &args.channel).await?;

    let pem = std::fs::read_to_string(&args.public_key_file)
        .with_context(|| format!("failed to read {:?}", args.public_key_file))?;

    // reject unusable material before it reaches the database
    latchkey_seal::channel_key_from_pem(&pem)
        .map_err(|e| color_eyre::eyre::eyre!("invalid ed25519 public key: {e}"))?;

    let key = ChannelKey::new(channel.id, args.kid, pem);
    let saved = db.upsert_channel_key(&key).await?;

    if saved.rotated_at.is_some() {
        println!("Rotated key {} for channel {}", saved.kid, channel.code);
    } else {
        println!("Registered key {} for channel {}", saved.kid, channel.code);
    }

    Ok(())
}

async fn list_keys(args: ListArgs) -> Result<()> {
    let db = args.db.connect().await?;
    let channel = require_channel(&db, &args.channel).await?;

    let keys = db.list_channel_keys(channel.id).await?;
    if keys.is_empty() {
        println!("No keys registered for channel {}.", channel.code);
        return Ok(());
    }

    println!("{:<6} {:<12} {:<8} {:<10} ROTATED", "ID", "KID", "ALG", "STATUS");
    println!("{}", "-".repeat(60));
    for key in keys {
        let rotated = key
            .rotated_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<6} {:<12} {:<8} {:<10} {}",
            key.id, key.kid, key.algorithm, key.status, rotated
        );
    }

    Ok(())
}
