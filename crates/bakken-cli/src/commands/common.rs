use std::env;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bakken_sync::{
    CollectionKind, FileStore, LocalMirror, Player, PlayerId, Snapshot, StatusReport, SyncConfig,
    SyncManager, SyncOutcome, SyncStatus,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

const ENV_STORE_PATH: &str = "BAKKEN_STORE_PATH";

/// Shared options every command runs with.
#[derive(Debug, Clone)]
pub struct Context {
    pub store_path: PathBuf,
    pub offline: bool,
}

#[derive(Debug, Serialize)]
pub struct CollectionSummary {
    pub collection: CollectionKind,
    pub has_data: bool,
    pub last_update: Option<i64>,
    pub relative_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    #[serde(flatten)]
    pub report: StatusReport,
    pub store_path: String,
    pub collections: Vec<CollectionSummary>,
}

pub fn resolve_store_path(cli_store_path: Option<PathBuf>) -> PathBuf {
    cli_store_path
        .or_else(|| env::var_os(ENV_STORE_PATH).map(PathBuf::from))
        .unwrap_or_else(default_store_path)
}

pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bakken")
        .join("store.json")
}

/// Build a manager over the file store without touching the network.
pub fn open_manager(context: &Context) -> Result<SyncManager, CliError> {
    let config = SyncConfig::from_env()?;
    open_manager_with(context, config)
}

pub fn open_manager_with(context: &Context, config: SyncConfig) -> Result<SyncManager, CliError> {
    let store = FileStore::open(&context.store_path)?;
    let manager = SyncManager::builder(config, Arc::new(store))
        .online(!context.offline)
        .build()?;
    Ok(manager)
}

/// Build a manager and connect it unless running offline.
pub async fn connect_manager(context: &Context) -> Result<SyncManager, CliError> {
    let manager = open_manager(context)?;
    if !context.offline {
        let status = manager.initialize().await;
        tracing::debug!("Initialized with status {}", status);
    }
    Ok(manager)
}

/// Fail unless the manager can reach the remote backend.
pub async fn require_remote(manager: &SyncManager) -> Result<(), CliError> {
    let report = manager.status().await;
    if report.status == SyncStatus::OfflineOnly || report.tournament_id.is_none() || !report.online
    {
        return Err(CliError::RemoteUnavailable);
    }
    Ok(())
}

pub fn collection_summaries(mirror: &LocalMirror, now_ms: i64) -> Vec<CollectionSummary> {
    CollectionKind::ALL
        .iter()
        .map(|&collection| {
            let last_update = mirror.last_update(collection);
            CollectionSummary {
                collection,
                has_data: mirror.has_local_data(collection),
                last_update,
                relative_time: last_update.map(|updated| format_relative_time(updated, now_ms)),
            }
        })
        .collect()
}

pub fn format_status_lines(output: &StatusOutput) -> Vec<String> {
    let report = &output.report;
    let mut lines = vec![
        format!("Status:      {}", report.status),
        format!(
            "Remote:      {}",
            if report.has_remote_client {
                "configured"
            } else {
                "unavailable"
            }
        ),
        format!(
            "Tournament:  {}",
            report.tournament_id.as_deref().unwrap_or("-")
        ),
        format!("Pending:     {}", report.pending_sync_count),
        format!("Store:       {}", output.store_path),
    ];
    for summary in &output.collections {
        let updated = match (&summary.relative_time, summary.has_data) {
            (Some(relative), _) => format!("updated {relative}"),
            (None, true) => "from remote".to_string(),
            (None, false) => "empty".to_string(),
        };
        lines.push(format!("  {:<8} {updated}", summary.collection.as_str()));
    }
    lines
}

pub fn format_player_lines(players: &[Player]) -> Vec<String> {
    players
        .iter()
        .map(|player| format!("{:<15}  {}", player.id.to_string(), player.name))
        .collect()
}

pub fn format_outcome(collection: CollectionKind, outcome: SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Synced => format!("{} synced", collection.label()),
        SyncOutcome::Queued => format!("{} saved locally, queued for sync", collection.label()),
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let second = 1_000;
    let minute = 60 * second;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < 5 * second {
        "just now".to_string()
    } else if diff < minute {
        format!("{}s ago", diff / second)
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn normalize_player_name(parts: &[String]) -> Result<String, CliError> {
    let joined = parts.join(" ");
    let collapsed = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        Err(CliError::EmptyPlayerName)
    } else {
        Ok(collapsed)
    }
}

pub fn parse_player_id(raw: &str) -> Result<PlayerId, CliError> {
    if raw.trim().is_empty() {
        return Err(CliError::EmptyPlayerId);
    }
    match raw.parse::<PlayerId>() {
        Ok(id) => Ok(id),
        Err(never) => match never {},
    }
}

/// Read a JSON snapshot from a file, or from stdin for `-`.
pub fn read_snapshot(input: &str) -> Result<Snapshot, CliError> {
    let raw = if input == "-" {
        let mut buffer = String::new();
        io::stdin().lock().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(Path::new(input))?
    };
    parse_snapshot(&raw)
}

pub fn parse_snapshot(raw: &str) -> Result<Snapshot, CliError> {
    if raw.trim().is_empty() {
        return Err(CliError::InvalidInput("snapshot document is empty".to_string()));
    }
    let value: Value = serde_json::from_str(raw)?;
    if value.is_null() {
        return Err(CliError::InvalidInput("snapshot cannot be null".to_string()));
    }
    Ok(Snapshot::new(value))
}
