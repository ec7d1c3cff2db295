//! Replace-all pushes, the drain loop and the cloud read.

use chrono::{DateTime, SecondsFormat};
use serde::Serialize;
use serde_json::{Map, Value};

use super::SyncManager;
use crate::events::{NoticeLevel, SyncStatus};
use crate::models::{CloudData, CollectionKind, Payload, Player, PlayerRow, Snapshot};
use crate::queue::PendingWrite;
use crate::remote::{
    Filter, RemoteBackend, SelectQuery, TOURNAMENT_ID_COLUMN, UPDATED_AT_COLUMN,
};
use crate::{Error, Result};

/// What happened to a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOutcome {
    /// The remote collection now matches the payload.
    Synced,
    /// The payload is waiting in the pending queue.
    Queued,
}

/// Result of one pass over the pending queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub synced: usize,
    pub failed: usize,
    pub remaining: usize,
}

impl SyncManager {
    /// Replace the remote players with `players`, or queue them.
    pub async fn sync_players(&self, players: Vec<Player>) -> SyncOutcome {
        self.sync(Payload::Players(players)).await
    }

    pub async fn sync_teams(&self, teams: Snapshot) -> SyncOutcome {
        self.sync(Payload::Teams(teams)).await
    }

    pub async fn sync_games(&self, games: Snapshot) -> SyncOutcome {
        self.sync(Payload::Games(games)).await
    }

    /// Write `players` to the local mirror, then sync them.
    pub async fn save_players(&self, players: Vec<Player>) -> Result<SyncOutcome> {
        self.save(Payload::Players(players)).await
    }

    pub async fn save_teams(&self, teams: Snapshot) -> Result<SyncOutcome> {
        self.save(Payload::Teams(teams)).await
    }

    pub async fn save_games(&self, games: Snapshot) -> Result<SyncOutcome> {
        self.save(Payload::Games(games)).await
    }

    async fn save(&self, payload: Payload) -> Result<SyncOutcome> {
        self.inner.mirror.write(&payload, true)?;
        Ok(self.sync(payload).await)
    }

    /// Push `payload` now if the remote is reachable, otherwise queue it.
    ///
    /// Remote failures never surface as errors: the payload is queued again
    /// and a warning notice is emitted.
    pub async fn sync(&self, payload: Payload) -> SyncOutcome {
        let kind = payload.kind();
        let Some((backend, tournament_id)) = self.remote_target().await else {
            tracing::debug!("Remote not ready, queueing {}", kind);
            self.enqueue(payload).await;
            return SyncOutcome::Queued;
        };

        let mark = self.inner.queue.lock().await.next_seq();
        let updated_at = self.updated_at();
        match replace_all(backend.as_ref(), &tournament_id, &payload, &updated_at).await {
            Ok(()) => {
                tracing::info!("Synced {} to tournament {}", kind, tournament_id);
                self.discard_superseded(kind, mark).await;
                self.inner
                    .events
                    .notice(NoticeLevel::Info, format!("{} synced", kind.label()));
                SyncOutcome::Synced
            }
            Err(error) => {
                tracing::error!("Failed to sync {}: {}", kind, error);
                self.inner.events.notice(
                    NoticeLevel::Warning,
                    format!("{} sync failed, will retry", kind.label()),
                );
                self.enqueue(payload).await;
                SyncOutcome::Queued
            }
        }
    }

    /// Push every pending write in enqueue order.
    ///
    /// Stops early once the remote becomes unavailable. Entries that fail
    /// stay queued for the next drain; entries replaced while their push was
    /// in flight are kept.
    pub async fn drain_pending(&self) -> DrainReport {
        if !self.try_begin_drain() {
            tracing::debug!("Drain already running");
            return DrainReport {
                remaining: self.inner.queue.lock().await.len(),
                ..DrainReport::default()
            };
        }
        let report = self.drain_entries().await;
        self.end_drain();
        report
    }

    async fn drain_entries(&self) -> DrainReport {
        let entries = self.pending_writes().await;
        let mut report = DrainReport::default();
        if !entries.is_empty() {
            tracing::info!("Draining {} pending write(s)", entries.len());
        }

        for entry in &entries {
            if !self.inner.queue.lock().await.is_live(entry) {
                tracing::debug!("{} was superseded, skipping", entry.kind());
                continue;
            }
            let Some((backend, tournament_id)) = self.remote_target().await else {
                tracing::info!("Remote unavailable, pausing drain");
                break;
            };
            let updated_at = self.updated_at();
            match replace_all(backend.as_ref(), &tournament_id, &entry.payload, &updated_at).await
            {
                Ok(()) => {
                    report.synced += 1;
                    self.complete(entry).await;
                    self.inner
                        .events
                        .notice(NoticeLevel::Info, format!("{} synced", entry.kind().label()));
                }
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!("Pending {} still not synced: {}", entry.kind(), error);
                    self.inner.events.notice(
                        NoticeLevel::Warning,
                        format!("{} sync failed, will retry", entry.kind().label()),
                    );
                }
            }
        }

        report.remaining = self.inner.queue.lock().await.len();
        self.settle_status(report.remaining).await;
        report
    }

    /// Move to `Connected` once nothing is pending and the remote is ready,
    /// or to `PendingSync` while writes wait.
    async fn settle_status(&self, remaining: usize) {
        let target = if remaining == 0 {
            if self.remote_target().await.is_none() {
                return;
            }
            SyncStatus::Connected
        } else if self.inner.state.lock().await.offline_only {
            return;
        } else {
            SyncStatus::PendingSync
        };
        if self.inner.state.lock().await.status != target {
            self.set_status(target).await;
        }
    }

    /// Forget a queued write of `kind` that a direct push just overtook.
    async fn discard_superseded(&self, kind: CollectionKind, mark: u64) {
        let remaining = {
            let mut queue = self.inner.queue.lock().await;
            if !queue.discard_older(kind, mark) {
                return;
            }
            tracing::debug!("Dropped queued {} superseded by a direct sync", kind);
            self.persist_queue(&queue);
            queue.len()
        };
        self.settle_status(remaining).await;
    }

    async fn complete(&self, entry: &PendingWrite) {
        let mut queue = self.inner.queue.lock().await;
        if !queue.complete(entry) {
            tracing::debug!("{} was re-queued while syncing, keeping newer write", entry.kind());
        }
        self.persist_queue(&queue);
    }

    /// Read every collection of the current tournament.
    ///
    /// Returns `None` when the remote is not ready or any read fails.
    pub async fn load_from_cloud(&self) -> Option<CloudData> {
        let (backend, tournament_id) = self.remote_target().await?;
        match fetch_cloud(backend.as_ref(), &tournament_id).await {
            Ok(data) => {
                tracing::info!(
                    "Loaded {} player(s) from tournament {}",
                    data.players.len(),
                    tournament_id
                );
                Some(data)
            }
            Err(error) => {
                tracing::error!("Failed to load from cloud: {}", error);
                None
            }
        }
    }

    fn updated_at(&self) -> String {
        let now = self.inner.mirror.now_millis();
        DateTime::from_timestamp_millis(now)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// Make the remote collection equal to `payload`: delete every row of the
/// tournament, then insert the new rows.
///
/// Not atomic. If the insert fails the remote collection stays empty until
/// the queued retry succeeds.
pub(crate) async fn replace_all(
    backend: &dyn RemoteBackend,
    tournament_id: &str,
    payload: &Payload,
    updated_at: &str,
) -> Result<()> {
    let table = payload.kind().as_str();
    backend
        .delete(table, &[Filter::eq(TOURNAMENT_ID_COLUMN, tournament_id)])
        .await?;

    let rows = rows_for(tournament_id, payload, updated_at)?;
    if rows.is_empty() {
        return Ok(());
    }
    backend.insert(table, rows).await?;
    Ok(())
}

fn rows_for(tournament_id: &str, payload: &Payload, updated_at: &str) -> Result<Vec<Value>> {
    match payload {
        Payload::Players(players) => players
            .iter()
            .map(|player| serde_json::to_value(PlayerRow::new(player, tournament_id)))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from),
        Payload::Teams(snapshot) | Payload::Games(snapshot) => {
            let kind = payload.kind();
            let column = kind
                .data_column()
                .ok_or_else(|| Error::Data(format!("{kind} has no snapshot column")))?;
            let mut row = Map::new();
            row.insert(
                TOURNAMENT_ID_COLUMN.to_string(),
                Value::String(tournament_id.to_string()),
            );
            row.insert(column.to_string(), snapshot.as_value().clone());
            row.insert(
                UPDATED_AT_COLUMN.to_string(),
                Value::String(updated_at.to_string()),
            );
            Ok(vec![Value::Object(row)])
        }
    }
}

async fn fetch_cloud(backend: &dyn RemoteBackend, tournament_id: &str) -> Result<CloudData> {
    let scope = Filter::eq(TOURNAMENT_ID_COLUMN, tournament_id);
    let players_query = SelectQuery::new().filter(scope.clone());
    let latest = SelectQuery::new()
        .filter(scope)
        .order_desc(UPDATED_AT_COLUMN)
        .limit(1);

    let (players, teams, games) = futures::join!(
        backend.select(CollectionKind::Players.as_str(), &players_query),
        backend.select(CollectionKind::Teams.as_str(), &latest),
        backend.select(CollectionKind::Games.as_str(), &latest),
    );

    let players = players?
        .into_iter()
        .map(|row| serde_json::from_value::<PlayerRow>(row).map(Player::from))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|error| Error::Data(format!("invalid player row: {error}")))?;

    Ok(CloudData {
        players,
        teams: latest_snapshot(CollectionKind::Teams, &teams?),
        games: latest_snapshot(CollectionKind::Games, &games?),
    })
}

fn latest_snapshot(kind: CollectionKind, rows: &[Value]) -> Option<Snapshot> {
    let column = kind.data_column()?;
    rows.first()
        .and_then(|row| row.get(column))
        .filter(|data| !data.is_null())
        .cloned()
        .map(Snapshot::new)
}
