//! Player model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::clock::Clock;

/// Player identifier as produced by the app: numeric ids from older
/// clients, string ids from newer ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlayerId {
    Number(i64),
    Text(String),
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl FromStr for PlayerId {
    type Err = std::convert::Infallible;

    /// Integers parse as numeric ids; anything else is kept as text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Ok(trimmed
            .parse::<i64>()
            .map_or_else(|_| Self::Text(trimmed.to_string()), Self::Number))
    }
}

impl From<i64> for PlayerId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A player registered in the active tournament
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
}

impl Player {
    #[must_use]
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Player with a time-based numeric id, the way the app assigns them.
    #[must_use]
    pub fn with_generated_id(clock: &dyn Clock, name: impl Into<String>) -> Self {
        Self::new(clock.now_millis(), name)
    }
}

/// Remote `players` row: a player scoped to one tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRow {
    pub id: PlayerId,
    pub name: String,
    pub tournament_id: String,
}

impl PlayerRow {
    #[must_use]
    pub fn new(player: &Player, tournament_id: &str) -> Self {
        Self {
            id: player.id.clone(),
            name: player.name.clone(),
            tournament_id: tournament_id.to_string(),
        }
    }
}

impl From<PlayerRow> for Player {
    fn from(row: PlayerRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn generated_id_comes_from_clock() {
        let clock = ManualClock::new(1_750_000_000_123);
        assert_eq!(
            Player::with_generated_id(&clock, "Ada"),
            Player::new(1_750_000_000_123, "Ada")
        );
    }

    #[test]
    fn player_id_accepts_numbers_and_strings() {
        let numeric: Player = serde_json::from_str(r#"{"id":1,"name":"A"}"#).unwrap();
        assert_eq!(numeric.id, PlayerId::Number(1));

        let text: Player = serde_json::from_str(r#"{"id":"p-7","name":"B"}"#).unwrap();
        assert_eq!(text.id, PlayerId::Text("p-7".to_string()));
    }

    #[test]
    fn player_id_parses_cli_input() {
        assert_eq!("42".parse::<PlayerId>().unwrap(), PlayerId::Number(42));
        assert_eq!(
            " abc ".parse::<PlayerId>().unwrap(),
            PlayerId::Text("abc".to_string())
        );
    }

    #[test]
    fn remote_row_drops_tournament_scope() {
        let row: PlayerRow =
            serde_json::from_str(r#"{"id":3,"name":"C","tournament_id":"t-1"}"#).unwrap();
        assert_eq!(Player::from(row), Player::new(3, "C"));
    }
}
