//! Typed view of the mirrored collections inside the local store.

use std::sync::Arc;

use crate::clock::Clock;
use crate::models::{CollectionKind, Payload, Player, Snapshot};
use crate::store::{LocalStore, TOURNAMENT_ID_KEY};
use crate::Result;

/// Local copy of the tournament's players, teams and games.
#[derive(Clone)]
pub struct LocalMirror {
    store: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
}

impl LocalMirror {
    pub fn new(store: Arc<dyn LocalStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn tournament_id(&self) -> Option<String> {
        crate::config::non_blank(self.store.get(TOURNAMENT_ID_KEY))
    }

    pub fn set_tournament_id(&self, id: &str) {
        self.store.set(TOURNAMENT_ID_KEY, id);
    }

    /// Mirrored players; unreadable data counts as an empty list.
    pub fn players(&self) -> Vec<Player> {
        let Some(raw) = self.store.get(CollectionKind::Players.storage_key()) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|error| {
            tracing::warn!("Ignoring unreadable local players: {}", error);
            Vec::new()
        })
    }

    /// Mirrored snapshot for teams or games.
    pub fn snapshot(&self, kind: CollectionKind) -> Option<Snapshot> {
        let raw = self.store.get(kind.storage_key())?;
        match serde_json::from_str::<Snapshot>(&raw) {
            Ok(snapshot) if !snapshot.is_null() => Some(snapshot),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!("Ignoring unreadable local {}: {}", kind, error);
                None
            }
        }
    }

    /// Whether anything worth keeping is mirrored for `kind`.
    pub fn has_local_data(&self, kind: CollectionKind) -> bool {
        match kind {
            CollectionKind::Players => !self.players().is_empty(),
            CollectionKind::Teams | CollectionKind::Games => self.snapshot(kind).is_some(),
        }
    }

    /// Last local update of `kind` in Unix ms.
    pub fn last_update(&self, kind: CollectionKind) -> Option<i64> {
        self.store
            .get(kind.last_update_key())
            .and_then(|raw| raw.trim().parse().ok())
    }

    /// Stamp `kind` as updated now.
    pub fn touch(&self, kind: CollectionKind) {
        let now = self.clock.now_millis();
        self.store.set(kind.last_update_key(), &now.to_string());
    }

    pub fn set_players(&self, players: &[Player]) -> Result<()> {
        let serialized = serde_json::to_string(players)?;
        self.store
            .set(CollectionKind::Players.storage_key(), &serialized);
        Ok(())
    }

    pub fn set_snapshot(&self, kind: CollectionKind, snapshot: &Snapshot) -> Result<()> {
        let serialized = serde_json::to_string(snapshot)?;
        self.store.set(kind.storage_key(), &serialized);
        Ok(())
    }

    /// Write a payload into the mirror, optionally stamping it as a fresh
    /// local update.
    pub fn write(&self, payload: &Payload, stamp: bool) -> Result<()> {
        match payload {
            Payload::Players(players) => self.set_players(players)?,
            Payload::Teams(snapshot) | Payload::Games(snapshot) => {
                self.set_snapshot(payload.kind(), snapshot)?;
            }
        }
        if stamp {
            self.touch(payload.kind());
        }
        Ok(())
    }
}
