//! Pending-write queue.
//!
//! A replacement buffer, not an append log: it holds at most one write per
//! collection, and a newer write for a collection replaces the older one.

use serde::{Deserialize, Serialize};

use crate::models::{CollectionKind, Payload};

/// A write waiting for connectivity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    pub payload: Payload,
    /// Unix ms at enqueue time
    pub enqueued_at: i64,
    /// Identity of this particular enqueue
    pub seq: u64,
}

impl PendingWrite {
    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    entries: Vec<PendingWrite>,
    next_seq: u64,
}

impl PendingQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from persisted entries, keeping the newest entry per
    /// collection.
    #[must_use]
    pub fn restore(entries: Vec<PendingWrite>) -> Self {
        let mut queue = Self::new();
        for entry in entries {
            queue.next_seq = queue.next_seq.max(entry.seq + 1);
            match queue.position(entry.kind()) {
                Some(index) if queue.entries[index].enqueued_at > entry.enqueued_at => {}
                Some(index) => queue.entries[index] = entry,
                None => queue.entries.push(entry),
            }
        }
        queue
    }

    /// Queue `payload`, replacing any pending write of the same collection.
    pub fn enqueue(&mut self, payload: Payload, now_millis: i64) -> &PendingWrite {
        let kind = payload.kind();
        self.entries.retain(|entry| entry.kind() != kind);

        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(PendingWrite {
            payload,
            enqueued_at: now_millis,
            seq,
        });
        tracing::debug!("Queued {} for sync (seq {})", kind, seq);
        &self.entries[self.entries.len() - 1]
    }

    /// Copy of the current entries, in enqueue order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PendingWrite> {
        self.entries.clone()
    }

    /// Remove `entry` if it is still the live write for its collection.
    ///
    /// Returns `false` when it was replaced in the meantime; the replacement
    /// stays queued.
    pub fn complete(&mut self, entry: &PendingWrite) -> bool {
        let before = self.entries.len();
        self.entries.retain(|live| live.seq != entry.seq);
        before != self.entries.len()
    }

    /// Whether `entry` is still the live write for its collection.
    #[must_use]
    pub fn is_live(&self, entry: &PendingWrite) -> bool {
        self.entries.iter().any(|live| live.seq == entry.seq)
    }

    /// Sequence number the next enqueue will get.
    #[must_use]
    pub const fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Drop the pending write for `kind` if it was enqueued before `seq`.
    ///
    /// Used once a newer payload for `kind` reached the remote directly.
    pub fn discard_older(&mut self, kind: CollectionKind, seq: u64) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.kind() != kind || entry.seq >= seq);
        before != self.entries.len()
    }

    #[must_use]
    pub fn get(&self, kind: CollectionKind) -> Option<&PendingWrite> {
        self.position(kind).map(|index| &self.entries[index])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &[PendingWrite] {
        &self.entries
    }

    fn position(&self, kind: CollectionKind) -> Option<usize> {
        self.entries.iter().position(|entry| entry.kind() == kind)
    }
}
