use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bakken")]
#[command(about = "Manage a Bakken tournament and keep it in sync from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local store file
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Skip connecting to the remote backend; writes are queued locally
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show connection and queue status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage players
    Players {
        #[command(subcommand)]
        command: PlayerCommands,
    },
    /// Show or replace the teams snapshot
    Teams {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Show or replace the games snapshot
    Games {
        #[command(subcommand)]
        command: SnapshotCommands,
    },
    /// Load remote data and merge it into the local store
    Pull,
    /// Push every pending write to the remote backend
    Push,
    /// Print sync events as JSON lines
    Watch {
        /// Stop after this many seconds (runs until Ctrl-C when omitted)
        #[arg(long, value_name = "SECONDS")]
        seconds: Option<u64>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PlayerCommands {
    /// List stored players
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a player and sync the roster
    Add {
        /// Player name
        name: Vec<String>,
        /// Explicit player id (generated when omitted)
        #[arg(long, value_name = "ID")]
        id: Option<String>,
    },
    /// Remove a player by id and sync the roster
    #[command(alias = "rm")]
    Remove {
        /// Player id
        id: String,
    },
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Print the stored snapshot as JSON
    Show,
    /// Replace the snapshot with a JSON document and sync it
    Set {
        /// JSON file to read (`-` reads stdin)
        #[arg(value_name = "FILE")]
        input: String,
    },
}

