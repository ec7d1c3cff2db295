//! Tournament model

use chrono::{Datelike, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a client picks the tournament it syncs into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "id", rename_all = "snake_case")]
pub enum TournamentIdStrategy {
    /// Generate an id on first run and keep it in the local store.
    #[default]
    Generated,
    /// Share one well-known tournament id across every client.
    Fixed(String),
}

impl TournamentIdStrategy {
    /// Resolve the tournament id for this session.
    ///
    /// A fixed id always wins; otherwise a previously persisted id is reused
    /// and a fresh UUID v7 is minted only when none exists.
    #[must_use]
    pub fn resolve(&self, persisted: Option<String>) -> String {
        match self {
            Self::Fixed(id) => id.clone(),
            Self::Generated => persisted.unwrap_or_else(|| Uuid::now_v7().to_string()),
        }
    }
}

/// Remote `tournaments` row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: String,
    pub name: String,
    /// RFC 3339 creation time
    pub created_at: String,
    pub status: String,
}

impl Tournament {
    /// New active tournament named after the current year.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: format!("Bakken {}", now.year()),
            created_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            status: "active".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_strategy_reuses_persisted_id() {
        let strategy = TournamentIdStrategy::Generated;
        assert_eq!(strategy.resolve(Some("t-1".to_string())), "t-1");

        let fresh = strategy.resolve(None);
        assert!(Uuid::parse_str(&fresh).is_ok());
    }

    #[test]
    fn fixed_strategy_ignores_persisted_id() {
        let strategy = TournamentIdStrategy::Fixed("bakken-2025".to_string());
        assert_eq!(strategy.resolve(Some("other".to_string())), "bakken-2025");
        assert_eq!(strategy.resolve(None), "bakken-2025");
    }

    #[test]
    fn new_tournament_is_active() {
        let tournament = Tournament::new("t-1");
        assert_eq!(tournament.status, "active");
        assert!(tournament.name.starts_with("Bakken "));
    }

    #[test]
    fn strategy_serializes_with_tag() {
        let json = serde_json::to_value(TournamentIdStrategy::Fixed("x".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"strategy": "fixed", "id": "x"}));
    }
}
