//! relkit CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use relkit_cli::cmd;
use relkit_cli::{Cli, Commands, Global};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let global = Global::from(&cli);
    match cli.command {
        Commands::SyncFrom(args) => cmd::sync::sync_from(&args, global).await,
        Commands::SyncTo(args) => cmd::sync::sync_to(&args, global).await,
        Commands::BuildRepo(args) => cmd::build::build_repo(&args, global).await,
        Commands::Keygen { output } => cmd::keys::keygen(&output),
        Commands::Sign { file, output } => cmd::keys::sign(&file, output.as_deref()).await,
    }
}
