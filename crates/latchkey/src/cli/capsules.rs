//! the `capsules` subcommand - inspect the capability capsule ledger.

use clap::{Args, Subcommand};
use color_eyre::eyre::Result;

use latchkey_db::Database;
use latchkey_types::CapsuleStatus;

use super::{require_channel, DbArgs};

/// inspect the capsule ledger
#[derive(Subcommand, Debug)]
pub enum CapsulesCommand {
    /// list capsules registered for a channel
    List(ListArgs),

    /// show one capsule's ledger state
    Show(ShowArgs),

    /// revoke a capsule (no further quota consumption)
    Revoke(ShowArgs),
}

/// list capsules
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    db: DbArgs,

    /// channel code
    channel: String,
}

/// address one capsule
#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    db: DbArgs,

    /// capsule identity (jti)
    jti: String,
}

impl CapsulesCommand {
    /// run the capsules command
    pub async fn run(self) -> Result<()> {
        match self {
            CapsulesCommand::List(args) => list_capsules(args).await,
            CapsulesCommand::Show(args) => show_capsule(args).await,
            CapsulesCommand::Revoke(args) => revoke_capsule(args).await,
        }
    }
}

async fn list_capsules(args: ListArgs) -> Result<()> {
    let db = args.db.connect().await?;
    let channel = require_channel(&db, &args.channel).await?;

    let capsules = db.list_capsules(channel.id).await?;
    if capsules.is_empty() {
        println!("No capsules registered for channel {}.", channel.code);
        return Ok(());
    }

    println!(
        "{:<24} {:<10} {:<8} {:<8} WINDOW",
        "JTI", "STATUS", "USED", "MAX"
    );
    println!("{}", "-".repeat(72));
    for capsule in capsules {
        let window = match (capsule.valid_from, capsule.valid_to) {
            (None, None) => "-".to_string(),
            (from, to) => format!(
                "{}..{}",
                from.map(|v| v.to_string()).unwrap_or_default(),
                to.map(|v| v.to_string()).unwrap_or_default()
            ),
        };
        println!(
            "{:<24} {:<10} {:<8} {:<8} {}",
            capsule.jti, capsule.status, capsule.quota_used, capsule.quota_max, window
        );
    }

    Ok(())
}

async fn show_capsule(args: ShowArgs) -> Result<()> {
    let db = args.db.connect().await?;

    let capsule = db
        .get_capsule(&args.jti)
        .await?
        .ok_or_else(|| color_eyre::eyre::eyre!("no capsule with jti {:?}", args.jti))?;

    println!("Capsule {}:", capsule.jti);
    println!("  Channel:  {}", capsule.channel_id);
    println!("  Status:   {}", capsule.status);
    println!(
        "  Quota:    {}/{} used ({} remaining)",
        capsule.quota_used,
        capsule.quota_max,
        capsule.quota_remaining()
    );
    if let Some(from) = capsule.valid_from {
        println!("  Valid from: {}", from);
    }
    if let Some(to) = capsule.valid_to {
        println!("  Valid to:   {}", to);
    }
    if !capsule.scope.models.is_empty() {
        println!("  Models:   {}", capsule.scope.models.join(", "));
    }
    println!("  Max/SN:   {}", capsule.scope.effective_max_per_sn());
    println!("  Payload:  {}", capsule.payload);

    Ok(())
}

async fn revoke_capsule(args: ShowArgs) -> Result<()> {
    let db = args.db.connect().await?;

    // confirm it exists first for a readable error
    db.get_capsule(&args.jti)
        .await?
        .ok_or_else(|| color_eyre::eyre::eyre!("no capsule with jti {:?}", args.jti))?;

    db.set_capsule_status(&args.jti, CapsuleStatus::Revoked)
        .await?;
    println!("Revoked capsule {}", args.jti);

    Ok(())
}
