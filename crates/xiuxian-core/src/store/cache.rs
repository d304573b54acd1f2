//! TTL read cache for progression snapshots.
//!
//! The store has exactly one snapshot identity, so a single slot is enough.
//! Writers invalidate after a committed save; readers within the TTL window
//! never touch the database.

use crate::model::ProgressionState;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct SnapshotCache {
    ttl: Duration,
    slot: Mutex<Option<CachedSnapshot>>,
}

struct CachedSnapshot {
    stored_at: Instant,
    state: ProgressionState,
}

impl SnapshotCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Cached snapshot, if one exists and is still fresh
    pub fn get(&self) -> Option<ProgressionState> {
        let slot = self.slot.lock().unwrap();
        match slot.as_ref() {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.state.clone()),
            _ => None,
        }
    }

    pub fn put(&self, state: ProgressionState) {
        let mut slot = self.slot.lock().unwrap();
        *slot = Some(CachedSnapshot {
            stored_at: Instant::now(),
            state,
        });
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().unwrap();
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cache_misses() {
        let cache = SnapshotCache::new(Duration::from_secs(3));
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_put_then_get_within_ttl() {
        let cache = SnapshotCache::new(Duration::from_secs(3));
        let state = ProgressionState::seeded("Qi Refining");
        cache.put(state.clone());
        assert_eq!(cache.get(), Some(state));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = SnapshotCache::new(Duration::from_millis(30));
        cache.put(ProgressionState::seeded("Qi Refining"));
        assert!(cache.get().is_some());

        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_invalidate_clears_the_slot() {
        let cache = SnapshotCache::new(Duration::from_secs(3));
        cache.put(ProgressionState::seeded("Qi Refining"));
        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn test_put_replaces_previous_entry() {
        let cache = SnapshotCache::new(Duration::from_secs(3));
        cache.put(ProgressionState::seeded("Qi Refining"));

        let mut newer = ProgressionState::seeded("Qi Refining");
        newer.add_realm("Foundation").unwrap();
        cache.put(newer.clone());

        assert_eq!(cache.get(), Some(newer));
    }
}
