//! Sync manager: the context object apps build once and share.
//!
//! Owns the local mirror, the pending-write queue, the remote backend handle
//! and the lifecycle state machine. Cloning is cheap; every clone drives the
//! same session.

mod init;
mod sync;


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::events::{EventBus, NoticeLevel, SyncEvent, SyncStatus};
use crate::mirror::LocalMirror;
use crate::models::Payload;
use crate::queue::{PendingQueue, PendingWrite};
use crate::remote::{RemoteBackend, SupabaseBackend};
use crate::store::{LocalStore, PENDING_SYNC_KEY};
use crate::Result;

pub use sync::{DrainReport, SyncOutcome};

/// Snapshot of the manager's state for presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: SyncStatus,
    pub online: bool,
    pub initialized: bool,
    pub tournament_id: Option<String>,
    pub pending_sync_count: usize,
    pub has_remote_client: bool,
}

#[derive(Debug)]
struct LifecycleState {
    status: SyncStatus,
    online: bool,
    initialized: bool,
    offline_only: bool,
    /// Set only once the tournament is verified remotely.
    tournament_id: Option<String>,
}

struct Inner {
    config: SyncConfig,
    mirror: LocalMirror,
    backend: Option<Arc<dyn RemoteBackend>>,
    events: EventBus,
    state: Mutex<LifecycleState>,
    queue: Mutex<PendingQueue>,
    /// Serializes `initialize` calls.
    init_lock: Mutex<()>,
    draining: AtomicBool,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let tasks = self
            .tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// Builder for [`SyncManager`].
pub struct SyncManagerBuilder {
    config: SyncConfig,
    store: Arc<dyn LocalStore>,
    backend: Option<Arc<dyn RemoteBackend>>,
    clock: Arc<dyn Clock>,
    online: bool,
}

impl SyncManagerBuilder {
    /// Use an explicit backend instead of the one derived from the config.
    #[must_use]
    pub fn backend(mut self, backend: Arc<dyn RemoteBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Initial connectivity (defaults to online).
    #[must_use]
    pub const fn online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn build(self) -> Result<SyncManager> {
        let backend = match (self.backend, &self.config.remote) {
            (Some(backend), _) => Some(backend),
            (None, Some(remote)) => {
                Some(Arc::new(SupabaseBackend::new(remote)?) as Arc<dyn RemoteBackend>)
            }
            (None, None) => None,
        };

        let mirror = LocalMirror::new(self.store, self.clock);
        let queue = if self.config.persist_queue {
            restore_queue(&mirror)
        } else {
            PendingQueue::new()
        };
        if !queue.is_empty() {
            tracing::info!("Restored {} pending write(s) from local store", queue.len());
        }

        Ok(SyncManager {
            inner: Arc::new(Inner {
                config: self.config,
                mirror,
                backend,
                events: EventBus::new(),
                state: Mutex::new(LifecycleState {
                    status: SyncStatus::Initializing,
                    online: self.online,
                    initialized: false,
                    offline_only: false,
                    tournament_id: None,
                }),
                queue: Mutex::new(queue),
                init_lock: Mutex::new(()),
                draining: AtomicBool::new(false),
                tasks: std::sync::Mutex::new(Vec::new()),
            }),
        })
    }
}

fn restore_queue(mirror: &LocalMirror) -> PendingQueue {
    let Some(raw) = mirror.store().get(PENDING_SYNC_KEY) else {
        return PendingQueue::new();
    };
    match serde_json::from_str::<Vec<PendingWrite>>(&raw) {
        Ok(entries) => PendingQueue::restore(entries),
        Err(error) => {
            tracing::warn!("Discarding unreadable pending-sync queue: {}", error);
            PendingQueue::new()
        }
    }
}

#[derive(Clone)]
pub struct SyncManager {
    inner: Arc<Inner>,
}

impl SyncManager {
    pub fn builder(config: SyncConfig, store: Arc<dyn LocalStore>) -> SyncManagerBuilder {
        SyncManagerBuilder {
            config,
            store,
            backend: None,
            clock: Arc::new(SystemClock),
            online: true,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn mirror(&self) -> &LocalMirror {
        &self.inner.mirror
    }

    /// Receive every event emitted from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub async fn status(&self) -> StatusReport {
        let pending_sync_count = self.inner.queue.lock().await.len();
        let state = self.inner.state.lock().await;
        StatusReport {
            status: state.status,
            online: state.online,
            initialized: state.initialized,
            tournament_id: state.tournament_id.clone(),
            pending_sync_count,
            has_remote_client: self.inner.backend.is_some() && !state.offline_only,
        }
    }

    pub async fn pending_writes(&self) -> Vec<PendingWrite> {
        self.inner.queue.lock().await.snapshot()
    }

    /// Record a connectivity change.
    ///
    /// Coming online drains the pending queue right away. In offline-only
    /// mode the flag is tracked but nothing else happens.
    pub async fn set_online(&self, online: bool) {
        {
            let mut state = self.inner.state.lock().await;
            state.online = online;
            if state.offline_only {
                tracing::debug!("Ignoring connectivity change in offline-only mode");
                return;
            }
        }

        if online {
            tracing::info!("Back online");
            self.inner.events.notice(NoticeLevel::Info, "Back online");
            self.set_status(SyncStatus::Online).await;
            self.drain_pending().await;
        } else {
            tracing::info!("Went offline");
            self.inner.events.notice(NoticeLevel::Warning, "Offline mode");
            self.set_status(SyncStatus::Offline).await;
        }
    }

    /// Stop the change listener and any retry loop.
    pub fn shutdown(&self) {
        let mut tasks = self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
        tracing::info!("Sync manager shut down");
    }

    async fn set_status(&self, status: SyncStatus) {
        self.inner.state.lock().await.status = status;
        tracing::debug!("Sync status -> {}", status);
        self.inner.events.status(status);
    }

    /// Backend and tournament to write to, when remote writes are possible.
    async fn remote_target(&self) -> Option<(Arc<dyn RemoteBackend>, String)> {
        let backend = self.inner.backend.clone()?;
        let state = self.inner.state.lock().await;
        if !state.online || state.offline_only {
            return None;
        }
        let tournament_id = state.tournament_id.clone()?;
        Some((backend, tournament_id))
    }

    async fn enqueue(&self, payload: Payload) {
        let kind = payload.kind();
        {
            let mut queue = self.inner.queue.lock().await;
            queue.enqueue(payload, self.inner.mirror.now_millis());
            self.persist_queue(&queue);
        }
        tracing::info!("Queued {} for sync", kind);

        let offline_only = self.inner.state.lock().await.offline_only;
        if !offline_only {
            self.set_status(SyncStatus::PendingSync).await;
        }
    }

    fn persist_queue(&self, queue: &PendingQueue) {
        if !self.inner.config.persist_queue {
            return;
        }
        let store = self.inner.mirror.store();
        if queue.is_empty() {
            store.remove(PENDING_SYNC_KEY);
            return;
        }
        match serde_json::to_string(queue.entries()) {
            Ok(serialized) => store.set(PENDING_SYNC_KEY, &serialized),
            Err(error) => tracing::warn!("Failed to persist pending-sync queue: {}", error),
        }
    }

    fn track_task(&self, task: JoinHandle<()>) {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    fn try_begin_drain(&self) -> bool {
        !self.inner.draining.swap(true, Ordering::SeqCst)
    }

    fn end_drain(&self) {
        self.inner.draining.store(false, Ordering::SeqCst);
    }
}
