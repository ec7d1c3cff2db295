//! In-process backend with a call log and failure injection.
//!
//! Used by tests and by local demos. Every insert/delete is echoed to
//! matching subscribers, like the hosted backend does.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{
    ChangeEvent, ChangeKind, Filter, RemoteBackend, SelectQuery, Subscription, TableFilter,
};
use crate::{Error, Result};

const SUBSCRIBER_BUFFER: usize = 256;

/// Operation kinds that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Delete,
    Select,
    Subscribe,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Insert { table: String, rows: Vec<Value> },
    Delete { table: String, filters: Vec<Filter> },
    Select { table: String, query: SelectQuery },
    Subscribe { channel: String, tables: Vec<String> },
}

impl BackendCall {
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Insert { table, .. } | Self::Delete { table, .. } | Self::Select { table, .. } => {
                Some(table)
            }
            Self::Subscribe { .. } => None,
        }
    }

    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Insert { .. } | Self::Delete { .. })
    }
}

#[derive(Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    calls: Vec<BackendCall>,
    failures: HashMap<(Operation, String), usize>,
    unreachable: bool,
    subscribers: Vec<(Vec<TableFilter>, mpsc::Sender<ChangeEvent>)>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<State>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every operation fail until reset.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Make the next `times` calls of `operation` on `table` fail.
    pub fn fail_next(&self, operation: Operation, table: &str, times: usize) {
        self.state()
            .failures
            .insert((operation, table.to_string()), times);
    }

    /// Pre-populate a table without notifying subscribers.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.state()
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state().calls.clone()
    }

    /// Recorded inserts and deletes, in order.
    #[must_use]
    pub fn write_calls(&self) -> Vec<BackendCall> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Push an arbitrary change to every subscriber watching its table.
    pub fn emit(&self, event: ChangeEvent) {
        let mut state = self.state();
        notify(&mut state, &event);
    }

    fn check(state: &mut State, operation: Operation, table: &str) -> Result<()> {
        if state.unreachable {
            return Err(Error::Backend("backend unreachable".to_string()));
        }
        let key = (operation, table.to_string());
        if let Some(remaining) = state.failures.get_mut(&key) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Backend(format!(
                    "injected {operation:?} failure on {table}"
                )));
            }
        }
        Ok(())
    }
}

fn notify(state: &mut State, event: &ChangeEvent) {
    let row = event
        .new
        .as_ref()
        .or(event.old.as_ref())
        .cloned()
        .unwrap_or(Value::Null);
    state.subscribers.retain(|(filters, sender)| {
        if !filters.iter().any(|filter| filter.covers(&event.table, &row)) {
            return !sender.is_closed();
        }
        match sender.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("Dropping change for slow subscriber on {}", event.table);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    });
}

#[async_trait]
impl RemoteBackend for MemoryBackend {
    async fn insert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        let mut state = self.state();
        state.calls.push(BackendCall::Insert {
            table: table.to_string(),
            rows: rows.clone(),
        });
        Self::check(&mut state, Operation::Insert, table)?;

        state
            .tables
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        for row in &rows {
            let event = ChangeEvent {
                table: table.to_string(),
                kind: ChangeKind::Insert,
                old: None,
                new: Some(row.clone()),
            };
            notify(&mut state, &event);
        }
        Ok(rows)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<()> {
        let mut state = self.state();
        state.calls.push(BackendCall::Delete {
            table: table.to_string(),
            filters: filters.to_vec(),
        });
        Self::check(&mut state, Operation::Delete, table)?;

        let existing = state.tables.remove(table).unwrap_or_default();
        let (removed, kept): (Vec<Value>, Vec<Value>) = existing
            .into_iter()
            .partition(|row| filters.iter().all(|filter| filter.matches(row)));
        state.tables.insert(table.to_string(), kept);
        for row in removed {
            let event = ChangeEvent {
                table: table.to_string(),
                kind: ChangeKind::Delete,
                old: Some(row),
                new: None,
            };
            notify(&mut state, &event);
        }
        Ok(())
    }

    async fn select(&self, table: &str, query: &SelectQuery) -> Result<Vec<Value>> {
        let mut state = self.state();
        state.calls.push(BackendCall::Select {
            table: table.to_string(),
            query: query.clone(),
        });
        Self::check(&mut state, Operation::Select, table)?;

        let mut rows: Vec<Value> = state
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters.iter().all(|filter| filter.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|left, right| {
                let ordering = sort_key(left, &order.column).cmp(&sort_key(right, &order.column));
                if order.ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn subscribe(&self, channel: &str, tables: Vec<TableFilter>) -> Result<Subscription> {
        let mut state = self.state();
        state.calls.push(BackendCall::Subscribe {
            channel: channel.to_string(),
            tables: tables.iter().map(|table| table.table.clone()).collect(),
        });
        Self::check(&mut state, Operation::Subscribe, channel)?;

        let (sender, events) = mpsc::channel(SUBSCRIBER_BUFFER);
        state.subscribers.push((tables, sender));
        Ok(Subscription::new(events, None))
    }
}

fn sort_key(row: &Value, column: &str) -> String {
    match row.get(column) {
        Some(Value::String(value)) => value.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Order;
    use serde_json::json;

    #[tokio::test]
    async fn select_filters_orders_and_limits() {
        let backend = MemoryBackend::new();
        backend.seed(
            "teams",
            vec![
                json!({"tournament_id": "t-1", "updated_at": "2025-01-01T00:00:00Z", "teams_data": 1}),
                json!({"tournament_id": "t-1", "updated_at": "2025-03-01T00:00:00Z", "teams_data": 3}),
                json!({"tournament_id": "t-2", "updated_at": "2025-09-01T00:00:00Z", "teams_data": 9}),
            ],
        );

        let query = SelectQuery::new()
            .filter(Filter::eq("tournament_id", "t-1"))
            .order_desc("updated_at")
            .limit(1);
        let rows = backend.select("teams", &query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["teams_data"], 3);

        let ascending = SelectQuery {
            order: Some(Order {
                column: "updated_at".to_string(),
                ascending: true,
            }),
            ..SelectQuery::new()
        };
        let rows = backend.select("teams", &ascending).await.unwrap();
        assert_eq!(rows[0]["teams_data"], 1);
    }

    #[tokio::test]
    async fn delete_only_removes_matching_rows() {
        let backend = MemoryBackend::new();
        backend.seed(
            "players",
            vec![
                json!({"id": 1, "tournament_id": "t-1"}),
                json!({"id": 2, "tournament_id": "t-2"}),
            ],
        );

        backend
            .delete("players", &[Filter::eq("tournament_id", "t-1")])
            .await
            .unwrap();
        assert_eq!(backend.rows("players"), vec![json!({"id": 2, "tournament_id": "t-2"})]);
    }

    #[tokio::test]
    async fn injected_failures_are_counted_down() {
        let backend = MemoryBackend::new();
        backend.fail_next(Operation::Insert, "games", 1);

        assert!(backend.insert("games", vec![json!({})]).await.is_err());
        assert!(backend.insert("games", vec![json!({})]).await.is_ok());
        assert_eq!(backend.write_calls().len(), 2);
    }

    #[tokio::test]
    async fn subscribers_receive_matching_changes_only() {
        let backend = MemoryBackend::new();
        let mut subscription = backend
            .subscribe(
                "tournament-t-1",
                vec![TableFilter::new(
                    "players",
                    Some(Filter::eq("tournament_id", "t-1")),
                )],
            )
            .await
            .unwrap();

        backend
            .insert("players", vec![json!({"id": 1, "tournament_id": "t-2"})])
            .await
            .unwrap();
        backend
            .insert("players", vec![json!({"id": 2, "tournament_id": "t-1"})])
            .await
            .unwrap();

        let event = subscription.next().await.unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.new.unwrap()["id"], 2);
    }

    #[tokio::test]
    async fn unreachable_backend_rejects_everything() {
        let backend = MemoryBackend::new();
        backend.set_unreachable(true);
        assert!(backend.select("tournaments", &SelectQuery::new()).await.is_err());
        assert!(backend.subscribe("c", Vec::new()).await.is_err());
    }
}
