//! Bakken CLI - Manage a tournament's players, teams and games from the
//! terminal, online or off.

mod cli;
mod commands;
mod error;


use bakken_sync::CollectionKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, PlayerCommands, SnapshotCommands};
use crate::commands::common::{resolve_store_path, Context};
use crate::commands::completions::run_completions;
use crate::commands::players::{run_players_add, run_players_list, run_players_remove};
use crate::commands::snapshots::{run_snapshot_set, run_snapshot_show};
use crate::commands::status::run_status;
use crate::commands::sync::{run_pull, run_push, run_watch};
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "bakken=info,bakken_sync=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let context = Context {
        store_path: resolve_store_path(cli.store),
        offline: cli.offline,
    };

    match cli.command {
        Commands::Status { json } => run_status(json, &context).await?,
        Commands::Players { command } => match command {
            PlayerCommands::List { json } => run_players_list(json, &context)?,
            PlayerCommands::Add { name, id } => {
                run_players_add(&name, id.as_deref(), &context).await?;
            }
            PlayerCommands::Remove { id } => run_players_remove(&id, &context).await?,
        },
        Commands::Teams { command } => run_snapshot(CollectionKind::Teams, command, &context).await?,
        Commands::Games { command } => run_snapshot(CollectionKind::Games, command, &context).await?,
        Commands::Pull => run_pull(&context).await?,
        Commands::Push => run_push(&context).await?,
        Commands::Watch { seconds } => run_watch(seconds, &context).await?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}

async fn run_snapshot(
    collection: CollectionKind,
    command: SnapshotCommands,
    context: &Context,
) -> Result<(), CliError> {
    match command {
        SnapshotCommands::Show => run_snapshot_show(collection, context),
        SnapshotCommands::Set { input } => run_snapshot_set(collection, &input, context).await,
    }
}
