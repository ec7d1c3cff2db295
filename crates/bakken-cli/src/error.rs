use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] bakken_sync::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Player name cannot be empty")]
    EmptyPlayerName,
    #[error("Player id cannot be empty")]
    EmptyPlayerId,
    #[error("Player not found: {0}")]
    PlayerNotFound(String),
    #[error("A player with id {0} already exists")]
    DuplicatePlayer(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error(
        "Remote sync is unavailable. Set BAKKEN_SUPABASE_URL and BAKKEN_SUPABASE_ANON_KEY, check connectivity, and drop --offline."
    )]
    RemoteUnavailable,
}
