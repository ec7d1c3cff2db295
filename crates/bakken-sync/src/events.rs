//! Observable events for presentation layers.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::CollectionKind;

const EVENT_CAPACITY: usize = 128;

/// Lifecycle state of the sync manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Initializing,
    Connected,
    Online,
    Offline,
    /// Remote unavailable for the rest of the session.
    OfflineOnly,
    PendingSync,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Connected => "connected",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::OfflineOnly => "offline-only",
            Self::PendingSync => "pending-sync",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Event emitted by the sync manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "detail")]
pub enum SyncEvent {
    #[serde(rename = "sync-status-changed")]
    StatusChanged { status: SyncStatus },
    #[serde(rename = "bakken-data-updated")]
    DataUpdated {
        table: CollectionKind,
        source: DataSource,
    },
    #[serde(rename = "bakken-data-loaded")]
    DataLoaded { adopted: Vec<CollectionKind> },
    /// Short user-facing message ("Players synced", "Offline mode", ...).
    #[serde(rename = "sync-notice")]
    Notice { level: NoticeLevel, message: String },
}

impl SyncEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::StatusChanged { .. } => "sync-status-changed",
            Self::DataUpdated { .. } => "bakken-data-updated",
            Self::DataLoaded { .. } => "bakken-data-loaded",
            Self::Notice { .. } => "sync-notice",
        }
    }
}

/// Fan-out of sync events to any number of listeners.
///
/// Emitting never blocks and never fails; events without listeners are
/// dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        tracing::trace!("Emitting {}", event.name());
        let _ = self.sender.send(event);
    }

    pub fn status(&self, status: SyncStatus) {
        self.emit(SyncEvent::StatusChanged { status });
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(SyncEvent::Notice {
            level,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_serialize_with_wire_names() {
        let event = SyncEvent::DataUpdated {
            table: CollectionKind::Players,
            source: DataSource::Remote,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"event": "bakken-data-updated", "detail": {"table": "players", "source": "remote"}})
        );

        let status = SyncEvent::StatusChanged {
            status: SyncStatus::OfflineOnly,
        };
        assert_eq!(
            serde_json::to_value(&status).unwrap()["detail"]["status"],
            "offline-only"
        );
        assert_eq!(status.name(), "sync-status-changed");
    }

    #[tokio::test]
    async fn bus_fans_out_to_every_receiver() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.status(SyncStatus::Connected);

        for receiver in [&mut first, &mut second] {
            assert_eq!(
                receiver.recv().await.unwrap(),
                SyncEvent::StatusChanged {
                    status: SyncStatus::Connected
                }
            );
        }
    }

    #[test]
    fn emit_without_receivers_is_harmless() {
        EventBus::new().notice(NoticeLevel::Info, "nobody listens");
    }
}
