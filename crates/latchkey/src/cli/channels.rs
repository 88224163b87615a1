//! the `channels` subcommand - manage reseller channels.

use clap::{Args, Subcommand};
use color_eyre::eyre::Result;

use latchkey_db::Database;
use latchkey_types::{Channel, ChannelId, ChannelStatus};

use super::{require_channel, DbArgs};

/// manage channels
#[derive(Subcommand, Debug)]
pub enum ChannelsCommand {
    /// create a new channel
    Create(CreateArgs),

    /// list all channels
    List(ListArgs),

    /// disable a channel (all activation attempts rejected)
    Disable(StatusArgs),

    /// re-enable a channel
    Enable(StatusArgs),
}

/// create a new channel
#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    db: DbArgs,

    /// stable channel code (e.g. "CH1")
    code: String,

    /// display name
    #[arg(short, long)]
    name: Option<String>,
}

/// list channels
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    db: DbArgs,

    /// output format (table, json)
    #[arg(short, long, default_value = "table")]
    output: String,
}

/// enable or disable a channel
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    db: DbArgs,

    /// channel code
    code: String,
}

impl ChannelsCommand {
    /// run the channels command
    pub async fn run(self) -> Result<()> {
        match self {
            ChannelsCommand::Create(args) => create_channel(args).await,
            ChannelsCommand::List(args) => list_channels(args).await,
            ChannelsCommand::Disable(args) => set_status(args, ChannelStatus::Disabled).await,
            ChannelsCommand::Enable(args) => set_status(args, ChannelStatus::Active).await,
        }
    }
}

async fn create_channel(args: CreateArgs) -> Result<()> {
    let db = args.db.connect().await?;

    let name = args.name.unwrap_or_else(|| args.code.clone());
    let channel = Channel::new(ChannelId(0), args.code, name);
    let created = db.create_channel(&channel).await?;

    println!("Created channel:");
    println!("  ID:     {}", created.id);
    println!("  Code:   {}", created.code);
    println!("  Name:   {}", created.name);
    println!("  Status: {}", created.status);

    Ok(())
}

async fn list_channels(args: ListArgs) -> Result<()> {
    let db = args.db.connect().await?;
    let channels = db.list_channels().await?;

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&channels)?);
        return Ok(());
    }

    if channels.is_empty() {
        println!("No channels found.");
        return Ok(());
    }

    println!("{:<6} {:<12} {:<10} NAME", "ID", "CODE", "STATUS");
    println!("{}", "-".repeat(60));
    for channel in channels {
        println!(
            "{:<6} {:<12} {:<10} {}",
            channel.id, channel.code, channel.status, channel.name
        );
    }

    Ok(())
}

async fn set_status(args: StatusArgs, status: ChannelStatus) -> Result<()> {
    let db = args.db.connect().await?;
    let channel = require_channel(&db, &args.code).await?;

    db.set_channel_status(channel.id, status).await?;
    println!("Channel {} is now {}", channel.code, status);

    Ok(())
}
