//! Session startup: connection probe, tournament setup and subscription.

use std::sync::Arc;

use tokio::time::timeout;

use super::SyncManager;
use crate::config::RetryPolicy;
use crate::events::{SyncEvent, SyncStatus};
use crate::listener::spawn_listener;
use crate::models::{CollectionKind, Tournament};
use crate::reconcile::merge_on_load;
use crate::remote::{
    Filter, RemoteBackend, SelectQuery, Subscription, TableFilter, TOURNAMENTS_TABLE,
    TOURNAMENT_ID_COLUMN,
};
use crate::{Error, Result};

impl SyncManager {
    /// Connect to the remote backend and bring the mirror up to date.
    ///
    /// Never fails: any connection problem, including the overall timeout,
    /// switches the session to offline-only. Calling it again returns the
    /// current status without reconnecting.
    pub async fn initialize(&self) -> SyncStatus {
        let _init = self.inner.init_lock.lock().await;
        {
            let state = self.inner.state.lock().await;
            if state.initialized {
                return state.status;
            }
        }

        let Some(backend) = self.inner.backend.clone() else {
            tracing::info!("No remote configured, running local-only");
            self.fall_back_to_offline_only().await;
            return SyncStatus::OfflineOnly;
        };

        let connected = timeout(self.inner.config.init_timeout(), self.connect(backend.as_ref()))
            .await
            .unwrap_or_else(|_| Err(Error::Timeout("remote initialization".to_string())));

        let (tournament_id, subscription) = match connected {
            Ok(connected) => connected,
            Err(error) => {
                tracing::warn!("Remote unavailable, continuing offline-only: {}", error);
                self.fall_back_to_offline_only().await;
                return SyncStatus::OfflineOnly;
            }
        };

        let online = {
            let mut state = self.inner.state.lock().await;
            state.tournament_id = Some(tournament_id.clone());
            state.initialized = true;
            state.online
        };
        self.track_task(spawn_listener(
            self.inner.mirror.clone(),
            self.inner.events.clone(),
            subscription,
        ));
        tracing::info!("Connected to tournament {}", tournament_id);
        self.set_status(if online {
            SyncStatus::Connected
        } else {
            SyncStatus::Offline
        })
        .await;

        self.load_and_merge().await;
        self.drain_pending().await;

        if let Some(policy) = self.inner.config.retry {
            self.spawn_retry_loop(policy);
        }

        self.inner.state.lock().await.status
    }

    async fn connect(&self, backend: &dyn RemoteBackend) -> Result<(String, Subscription)> {
        probe(backend, self.inner.config.probe_timeout()).await?;
        let tournament_id = self.setup_tournament(backend).await?;

        let scope = Filter::eq(TOURNAMENT_ID_COLUMN, &tournament_id);
        let tables = CollectionKind::ALL
            .iter()
            .map(|kind| TableFilter::new(kind.as_str(), Some(scope.clone())))
            .collect();
        let subscription = backend
            .subscribe(&format!("tournament-{tournament_id}"), tables)
            .await?;
        Ok((tournament_id, subscription))
    }

    /// Resolve the tournament id and make sure exactly one remote record
    /// exists for it.
    async fn setup_tournament(&self, backend: &dyn RemoteBackend) -> Result<String> {
        let mirror = &self.inner.mirror;
        let id = self.inner.config.tournament.resolve(mirror.tournament_id());

        let existing = backend
            .select(
                TOURNAMENTS_TABLE,
                &SelectQuery::new().filter(Filter::eq("id", &id)).limit(1),
            )
            .await?;
        if existing.is_empty() {
            let tournament = Tournament::new(&id);
            tracing::info!("Creating tournament {} ({})", tournament.name, id);
            backend
                .insert(TOURNAMENTS_TABLE, vec![serde_json::to_value(&tournament)?])
                .await?;
        } else {
            tracing::info!("Using existing tournament {}", id);
        }

        mirror.set_tournament_id(&id);
        Ok(id)
    }

    async fn load_and_merge(&self) {
        let Some(cloud) = self.load_from_cloud().await else {
            return;
        };
        match merge_on_load(
            &self.inner.mirror,
            cloud,
            self.inner.config.staleness_threshold_ms,
        ) {
            Ok(adopted) => self.inner.events.emit(SyncEvent::DataLoaded { adopted }),
            Err(error) => tracing::warn!("Failed to merge cloud data: {}", error),
        }
    }

    async fn fall_back_to_offline_only(&self) {
        {
            let mut state = self.inner.state.lock().await;
            state.offline_only = true;
            state.initialized = true;
            state.tournament_id = None;
        }
        self.set_status(SyncStatus::OfflineOnly).await;
    }

    /// Periodically drain the queue with capped exponential backoff.
    fn spawn_retry_loop(&self, policy: RetryPolicy) {
        let inner = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut attempt = 0_u32;
            loop {
                tokio::time::sleep(policy.delay(attempt)).await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                let manager = SyncManager { inner };

                let pending = manager.inner.queue.lock().await.len();
                if pending == 0 || manager.remote_target().await.is_none() {
                    attempt = 0;
                    continue;
                }

                let report = manager.drain_pending().await;
                attempt = if report.remaining == 0 {
                    0
                } else {
                    attempt.saturating_add(1)
                };
                tracing::debug!(
                    "Retry drain: {} synced, {} remaining, next attempt {}",
                    report.synced,
                    report.remaining,
                    attempt
                );
            }
        });
        self.track_task(task);
    }
}

/// Cheap read that proves the backend answers.
async fn probe(backend: &dyn RemoteBackend, limit: std::time::Duration) -> Result<()> {
    timeout(
        limit,
        backend.select(TOURNAMENTS_TABLE, &SelectQuery::new().limit(1)),
    )
    .await
    .map_err(|_| Error::Timeout("connection probe".to_string()))??;
    Ok(())
}
