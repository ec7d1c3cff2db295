//! Remote backend capabilities.
//!
//! The remote store only offers row inserts, filtered deletes, filtered and
//! ordered selects, and a row-change subscription. There is no upsert and no
//! transaction spanning several calls.

pub mod memory;
mod realtime;
mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::Result;

pub use memory::MemoryBackend;
pub use rest::SupabaseBackend;

pub const TOURNAMENTS_TABLE: &str = "tournaments";
pub const TOURNAMENT_ID_COLUMN: &str = "tournament_id";
pub const UPDATED_AT_COLUMN: &str = "updated_at";

/// Equality filter on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// PostgREST operator form, e.g. `eq.abc`.
    #[must_use]
    pub fn operator(&self) -> String {
        format!("eq.{}", self.value)
    }

    /// Realtime filter expression, e.g. `tournament_id=eq.abc`.
    #[must_use]
    pub fn expression(&self) -> String {
        format!("{}={}", self.column, self.operator())
    }

    /// Whether a JSON row satisfies this filter.
    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(value)) => *value == self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Filtered, optionally ordered and limited read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectQuery {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl SelectQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn order_desc(mut self, column: impl Into<String>) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending: false,
        });
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Row-change notification type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One remote row change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    #[serde(default)]
    pub old: Option<Value>,
    #[serde(default)]
    pub new: Option<Value>,
}

/// A table to watch, optionally narrowed by a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFilter {
    pub table: String,
    pub filter: Option<Filter>,
}

impl TableFilter {
    pub fn new(table: impl Into<String>, filter: Option<Filter>) -> Self {
        Self {
            table: table.into(),
            filter,
        }
    }

    /// Whether a change on `table` to `row` is covered by this filter.
    #[must_use]
    pub fn covers(&self, table: &str, row: &Value) -> bool {
        self.table == table && self.filter.as_ref().map_or(true, |filter| filter.matches(row))
    }
}

/// Live stream of change events.
///
/// Dropping the subscription stops the background connection task.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    #[must_use]
    pub const fn new(events: mpsc::Receiver<ChangeEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// Next change, or `None` once the stream has closed.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Capability-typed remote store.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Insert rows and return them as stored.
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>>;

    /// Delete every row matching all filters.
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()>;

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>>;

    /// Subscribe to row changes on `tables` under one channel.
    async fn subscribe(&self, channel: &str, tables: Vec<TableFilter>) -> Result<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_renders_postgrest_and_realtime_forms() {
        let filter = Filter::eq(TOURNAMENT_ID_COLUMN, "t-1");
        assert_eq!(filter.operator(), "eq.t-1");
        assert_eq!(filter.expression(), "tournament_id=eq.t-1");
    }

    #[test]
    fn filter_matches_strings_and_numbers() {
        assert!(Filter::eq("tournament_id", "t-1").matches(&json!({"tournament_id": "t-1"})));
        assert!(!Filter::eq("tournament_id", "t-1").matches(&json!({"tournament_id": "t-2"})));
        assert!(Filter::eq("id", "7").matches(&json!({"id": 7})));
        assert!(!Filter::eq("id", "7").matches(&json!({"name": "x"})));
    }

    #[test]
    fn table_filter_without_filter_covers_whole_table() {
        let all_games = TableFilter::new("games", None);
        assert!(all_games.covers("games", &json!({})));
        assert!(!all_games.covers("teams", &json!({})));
    }

    #[test]
    fn change_kind_uses_uppercase_names() {
        let event: ChangeEvent =
            serde_json::from_value(json!({"table": "players", "kind": "DELETE"})).unwrap();
        assert_eq!(event.kind, ChangeKind::Delete);
        assert!(event.new.is_none());
    }
}
