//! bakken-sync - Offline-tolerant sync for Bakken tournaments
//!
//! Keeps a local mirror of a tournament's players, teams and games in a
//! key-value store and reconciles it with a hosted Postgres backend
//! (Supabase). Writes made while offline are queued, one per collection,
//! and replayed once connectivity returns. Remote changes are streamed back
//! into the mirror.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod listener;
pub mod manager;
pub mod mirror;
pub mod models;
pub mod queue;
pub mod reconcile;
pub mod remote;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{RemoteConfig, RetryPolicy, SyncConfig};
pub use error::{Error, Result};
pub use events::{EventBus, NoticeLevel, SyncEvent, SyncStatus};
pub use manager::{DrainReport, StatusReport, SyncManager, SyncManagerBuilder, SyncOutcome};
pub use mirror::LocalMirror;
pub use models::{CloudData, CollectionKind, Payload, Player, PlayerId, Snapshot, Tournament};
pub use queue::{PendingQueue, PendingWrite};
pub use remote::{MemoryBackend, RemoteBackend, SupabaseBackend};
pub use store::{FileStore, LocalStore, MemoryStore};
