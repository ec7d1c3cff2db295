//! Merge-on-load policy.
//!
//! Each collection is arbitrated on its own: remote data replaces local data
//! unless the local copy was written within the staleness threshold. This is
//! a wall-clock heuristic, not conflict resolution; two clients editing the
//! same collection inside one window keep whichever side reads first.

use crate::mirror::LocalMirror;
use crate::models::{CloudData, CollectionKind, Payload};
use crate::Result;

/// Decide whether freshly loaded remote data replaces the local copy.
#[must_use]
pub const fn should_adopt_remote(
    has_local_data: bool,
    last_update: Option<i64>,
    now_millis: i64,
    staleness_threshold_ms: i64,
) -> bool {
    if !has_local_data {
        return true;
    }
    match last_update {
        None => true,
        Some(updated_at) => now_millis.saturating_sub(updated_at) > staleness_threshold_ms,
    }
}

/// Merge `cloud` into the mirror and return the collections that took the
/// remote value.
///
/// An empty remote roster is adopted like any other value; a missing remote
/// teams or games snapshot never overwrites local data.
pub fn merge_on_load(
    mirror: &LocalMirror,
    cloud: CloudData,
    staleness_threshold_ms: i64,
) -> Result<Vec<CollectionKind>> {
    let now = mirror.now_millis();
    let CloudData {
        players,
        teams,
        games,
    } = cloud;

    let roster_changes =
        !players.is_empty() || mirror.has_local_data(CollectionKind::Players);
    let candidates = [
        roster_changes.then_some(Payload::Players(players)),
        teams.filter(|snapshot| !snapshot.is_null()).map(Payload::Teams),
        games.filter(|snapshot| !snapshot.is_null()).map(Payload::Games),
    ];

    let mut adopted = Vec::new();
    for payload in candidates.into_iter().flatten() {
        let kind = payload.kind();
        let has_local = mirror.has_local_data(kind);
        let last_update = mirror.last_update(kind);

        if should_adopt_remote(has_local, last_update, now, staleness_threshold_ms) {
            mirror.write(&payload, false)?;
            adopted.push(kind);
        } else {
            tracing::info!(
                "Keeping local {} (updated {} ms ago)",
                kind,
                last_update.map_or(0, |updated_at| now - updated_at)
            );
        }
    }

    if !adopted.is_empty() {
        tracing::info!("Adopted remote data for {:?}", adopted);
    }
    Ok(adopted)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Player, Snapshot};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const THRESHOLD: i64 = 30_000;

    #[test]
    fn adopt_remote_when_no_local_data_or_timestamp() {
        assert!(should_adopt_remote(false, Some(1_000), 1_000, THRESHOLD));
        assert!(should_adopt_remote(true, None, 1_000, THRESHOLD));
    }

    #[test]
    fn staleness_boundary_is_exclusive() {
        let t0 = 100_000;
        assert!(!should_adopt_remote(true, Some(t0), t0 + 30_000, THRESHOLD));
        assert!(should_adopt_remote(true, Some(t0), t0 + 30_001, THRESHOLD));
        assert!(!should_adopt_remote(true, Some(t0), t0 + 5, THRESHOLD));
    }

    fn cloud() -> CloudData {
        CloudData {
            players: vec![Player::new(1, "Remote")],
            teams: Some(Snapshot::new(json!({"teams": "remote"}))),
            games: Some(Snapshot::new(json!({"games": "remote"}))),
        }
    }

    #[test]
    fn merge_mixes_fresh_local_and_stale_local_per_collection() {
        let clock = ManualClock::new(0);
        let mirror = LocalMirror::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));

        mirror
            .write(&Payload::Players(vec![Player::new(7, "Local")]), true)
            .unwrap();
        clock.set(50_000);
        mirror
            .write(&Payload::Teams(Snapshot::new(json!({"teams": "local"}))), true)
            .unwrap();
        clock.set(60_000);

        let adopted = merge_on_load(&mirror, cloud(), THRESHOLD).unwrap();

        assert_eq!(
            adopted,
            vec![CollectionKind::Players, CollectionKind::Games]
        );
        assert_eq!(mirror.players(), vec![Player::new(1, "Remote")]);
        assert_eq!(
            mirror.snapshot(CollectionKind::Teams),
            Some(Snapshot::new(json!({"teams": "local"})))
        );
        assert_eq!(
            mirror.snapshot(CollectionKind::Games),
            Some(Snapshot::new(json!({"games": "remote"})))
        );
        assert_eq!(mirror.last_update(CollectionKind::Games), None);
    }

    #[test]
    fn missing_remote_snapshots_never_wipe_local() {
        let mirror = LocalMirror::new(
            Arc::new(MemoryStore::new()),
            Arc::new(ManualClock::new(1_000_000)),
        );
        mirror
            .set_snapshot(CollectionKind::Games, &Snapshot::new(json!({"counter": 4})))
            .unwrap();

        let adopted = merge_on_load(&mirror, CloudData::default(), THRESHOLD).unwrap();

        assert!(adopted.is_empty());
        assert_eq!(
            mirror.snapshot(CollectionKind::Games),
            Some(Snapshot::new(json!({"counter": 4})))
        );
    }

    #[test]
    fn empty_remote_roster_replaces_stale_local_players() {
        let clock = ManualClock::new(0);
        let mirror = LocalMirror::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
        mirror
            .write(&Payload::Players(vec![Player::new(7, "Stale")]), true)
            .unwrap();
        clock.set(120_000);

        let adopted = merge_on_load(&mirror, CloudData::default(), THRESHOLD).unwrap();

        assert_eq!(adopted, vec![CollectionKind::Players]);
        assert!(mirror.players().is_empty());
    }

    #[test]
    fn empty_remote_roster_keeps_fresh_local_players() {
        let clock = ManualClock::new(0);
        let mirror = LocalMirror::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()));
        mirror
            .write(&Payload::Players(vec![Player::new(7, "Fresh")]), true)
            .unwrap();
        clock.set(10_000);

        let adopted = merge_on_load(&mirror, CloudData::default(), THRESHOLD).unwrap();

        assert!(adopted.is_empty());
        assert_eq!(mirror.players(), vec![Player::new(7, "Fresh")]);
    }
}
