//! latchkey - capability-gated license activation server.

use clap::Parser;
use color_eyre::eyre::Result;
use latchkey::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Command::Serve(cmd) => cmd.run().await,
        Command::Channels(cmd) => cmd.run().await,
        Command::Keys(cmd) => cmd.run().await,
        Command::Subaccounts(cmd) => cmd.run().await,
        Command::Capsules(cmd) => cmd.run().await,
    }
}
