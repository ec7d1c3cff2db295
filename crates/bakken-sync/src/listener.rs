//! Applies remote row changes to the local mirror.

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::events::{DataSource, EventBus, SyncEvent};
use crate::mirror::LocalMirror;
use crate::models::{CollectionKind, Player, PlayerId, Snapshot};
use crate::remote::{ChangeEvent, ChangeKind, Subscription};
use crate::{Error, Result};

/// Apply one change to the mirror.
///
/// Returns the collection that changed, or `None` when the change was a
/// no-op (duplicate insert, unknown id, snapshot delete).
pub fn apply_change(mirror: &LocalMirror, event: &ChangeEvent) -> Result<Option<CollectionKind>> {
    let kind = event
        .table
        .parse::<CollectionKind>()
        .map_err(Error::Data)?;

    let changed = match kind {
        CollectionKind::Players => apply_player_change(mirror, event)?,
        CollectionKind::Teams | CollectionKind::Games => apply_snapshot_change(mirror, kind, event)?,
    };

    if changed {
        mirror.touch(kind);
        Ok(Some(kind))
    } else {
        Ok(None)
    }
}

fn apply_player_change(mirror: &LocalMirror, event: &ChangeEvent) -> Result<bool> {
    let mut players = mirror.players();

    match event.kind {
        ChangeKind::Insert => {
            let player = parse_player(event.new.as_ref())?;
            if players.iter().any(|existing| existing.id == player.id) {
                return Ok(false);
            }
            players.push(player);
        }
        ChangeKind::Update => {
            let player = parse_player(event.new.as_ref())?;
            let Some(existing) = players.iter_mut().find(|existing| existing.id == player.id)
            else {
                return Ok(false);
            };
            *existing = player;
        }
        ChangeKind::Delete => {
            let id = parse_player_id(event.old.as_ref())?;
            let before = players.len();
            players.retain(|existing| existing.id != id);
            if players.len() == before {
                return Ok(false);
            }
        }
    }

    mirror.set_players(&players)?;
    Ok(true)
}

fn apply_snapshot_change(
    mirror: &LocalMirror,
    kind: CollectionKind,
    event: &ChangeEvent,
) -> Result<bool> {
    if event.kind == ChangeKind::Delete {
        return Ok(false);
    }
    let column = kind
        .data_column()
        .ok_or_else(|| Error::Data(format!("{kind} has no snapshot column")))?;
    let data = event
        .new
        .as_ref()
        .and_then(|row| row.get(column))
        .ok_or_else(|| Error::Data(format!("{kind} change without {column}")))?;

    mirror.set_snapshot(kind, &Snapshot::new(data.clone()))?;
    Ok(true)
}

fn parse_player(row: Option<&Value>) -> Result<Player> {
    let row = row.ok_or_else(|| Error::Data("player change without a new record".to_string()))?;
    serde_json::from_value(row.clone())
        .map_err(|error| Error::Data(format!("invalid player record: {error}")))
}

fn parse_player_id(row: Option<&Value>) -> Result<PlayerId> {
    let id = row
        .and_then(|row| row.get("id"))
        .ok_or_else(|| Error::Data("player delete without an id".to_string()))?;
    serde_json::from_value(id.clone())
        .map_err(|error| Error::Data(format!("invalid player id: {error}")))
}

/// Apply a change and announce it; malformed changes are logged and
/// dropped.
pub fn handle_change(mirror: &LocalMirror, events: &EventBus, event: &ChangeEvent) {
    match apply_change(mirror, event) {
        Ok(Some(table)) => {
            tracing::debug!("Applied remote {:?} on {}", event.kind, table);
            events.emit(SyncEvent::DataUpdated {
                table,
                source: DataSource::Remote,
            });
        }
        Ok(None) => {
            tracing::trace!("Remote {:?} on {} changed nothing", event.kind, event.table);
        }
        Err(error) => {
            tracing::warn!(
                "Dropping remote {:?} on {}: {}",
                event.kind,
                event.table,
                error
            );
        }
    }
}

/// Drive a subscription until it closes.
pub fn spawn_listener(
    mirror: LocalMirror,
    events: EventBus,
    mut subscription: Subscription,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            handle_change(&mirror, &events, &event);
        }
        tracing::info!("Change stream ended");
    })
}
