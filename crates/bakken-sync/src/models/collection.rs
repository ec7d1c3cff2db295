//! Synced collections and their snapshot payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use super::Player;

/// One of the three collections mirrored to the remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Players,
    Teams,
    Games,
}

impl CollectionKind {
    pub const ALL: [Self; 3] = [Self::Players, Self::Teams, Self::Games];

    /// Remote table name (also the event/queue type name).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Players => "players",
            Self::Teams => "teams",
            Self::Games => "games",
        }
    }

    /// Local store key holding the mirrored collection.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Players => "bakken-players",
            Self::Teams => "bakken-teams",
            Self::Games => "bakken-games",
        }
    }

    /// Local store key holding the last local update (Unix ms).
    #[must_use]
    pub const fn last_update_key(self) -> &'static str {
        match self {
            Self::Players => "bakken-players-last-update",
            Self::Teams => "bakken-teams-last-update",
            Self::Games => "bakken-games-last-update",
        }
    }

    /// Column carrying the snapshot blob for snapshot collections.
    #[must_use]
    pub const fn data_column(self) -> Option<&'static str> {
        match self {
            Self::Players => None,
            Self::Teams => Some("teams_data"),
            Self::Games => Some("games_data"),
        }
    }

    /// Label used in user-facing notices.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Players => "Players",
            Self::Teams => "Teams",
            Self::Games => "Games",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "players" => Ok(Self::Players),
            "teams" => Ok(Self::Teams),
            "games" => Ok(Self::Games),
            other => Err(format!("unknown collection: {other}")),
        }
    }
}

/// Opaque JSON blob holding a whole collection at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub Value);

impl Snapshot {
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Payload of a write for any collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Payload {
    Players(Vec<Player>),
    Teams(Snapshot),
    Games(Snapshot),
}

impl Payload {
    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        match self {
            Self::Players(_) => CollectionKind::Players,
            Self::Teams(_) => CollectionKind::Teams,
            Self::Games(_) => CollectionKind::Games,
        }
    }
}

/// Composite result of loading every collection from the remote backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudData {
    pub players: Vec<Player>,
    pub teams: Option<Snapshot>,
    pub games: Option<Snapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_keys_live_in_bakken_namespace() {
        for kind in CollectionKind::ALL {
            assert!(kind.storage_key().starts_with("bakken-"));
            assert_eq!(
                kind.last_update_key(),
                format!("{}-last-update", kind.storage_key())
            );
            assert_eq!(kind.as_str().parse::<CollectionKind>(), Ok(kind));
        }
    }

    #[test]
    fn payload_reports_its_kind() {
        let payload = Payload::Teams(Snapshot::new(serde_json::json!({"a": [1, 2]})));
        assert_eq!(payload.kind(), CollectionKind::Teams);

        let encoded = serde_json::to_value(&payload).unwrap();
        assert_eq!(encoded["type"], "teams");
    }
}
