//! the `subaccounts` subcommand - manage operator sub-accounts.

use clap::{Args, Subcommand};
use color_eyre::eyre::Result;

use latchkey_db::Database;
use latchkey_types::SubAccount;

use super::{require_channel, DbArgs};

/// manage operator sub-accounts
#[derive(Subcommand, Debug)]
pub enum SubaccountsCommand {
    /// create a sub-account with a freshly generated totp secret
    Create(CreateArgs),

    /// list sub-accounts under a channel
    List(ListArgs),
}

/// create a sub-account
#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    db: DbArgs,

    /// channel code
    channel: String,

    /// sub-account name (unique per channel, e.g. "ops1")
    name: String,
}

/// list sub-accounts
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    db: DbArgs,

    /// channel code
    channel: String,
}

impl SubaccountsCommand {
    /// run the subaccounts command
    pub async fn run(self) -> Result<()> {
        match self {
            SubaccountsCommand::Create(args) => create_subaccount(args).await,
            SubaccountsCommand::List(args) => list_subaccounts(args).await,
        }
    }
}

async fn create_subaccount(args: CreateArgs) -> Result<()> {
    let db = args.db.connect().await?;
    let channel = require_channel(&db, &args.channel).await?;

    let secret = latchkey_seal::generate_totp_secret();
    let sub = SubAccount::new(channel.id, args.name, secret);
    let created = db.create_subaccount(&sub).await?;

    println!("Created sub-account:");
    println!("  Channel:     {}", channel.code);
    println!("  Name:        {}", created.name);
    // the secret is printed exactly once, at creation
    println!("  TOTP secret: {}", created.totp_secret);

    Ok(())
}

async fn list_subaccounts(args: ListArgs) -> Result<()> {
    let db = args.db.connect().await?;
    let channel = require_channel(&db, &args.channel).await?;

    let subs = db.list_subaccounts(channel.id).await?;
    if subs.is_empty() {
        println!("No sub-accounts under channel {}.", channel.code);
        return Ok(());
    }

    println!("{:<6} {:<16} {:<10} LAST USED", "ID", "NAME", "STATUS");
    println!("{}", "-".repeat(60));
    for sub in subs {
        let last_used = sub
            .last_used_at
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{:<6} {:<16} {:<10} {}",
            sub.id, sub.name, sub.status, last_used
        );
    }

    Ok(())
}
