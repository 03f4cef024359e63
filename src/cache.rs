// src/cache.rs
//
// Memo layers kept between dashboard refreshes.

use crate::fetch::ExternalSeries;
use crate::read::SheetSet;
use moka::sync::Cache;
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};
use tracing::debug;

/// Upper bound on cached workbooks.
pub const SHEET_CACHE_CAPACITY: u64 = 512;

/// Sheet sets keyed by file path. Each entry remembers the modification time
/// it was read at; a different time is a miss and the next insert replaces
/// the entry, so one file never holds more than one slot.
#[derive(Clone)]
pub struct SheetCache {
    inner: Cache<PathBuf, (Option<SystemTime>, Arc<SheetSet>)>,
}

impl SheetCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// The cached set for `path`, if it was read at `modified`.
    pub fn get(&self, path: &Path, modified: Option<SystemTime>) -> Option<Arc<SheetSet>> {
        self.inner
            .get(path)
            .filter(|(stamp, _)| *stamp == modified)
            .map(|(_, set)| set)
    }

    pub fn insert(&self, path: PathBuf, modified: Option<SystemTime>, set: Arc<SheetSet>) {
        self.inner.insert(path, (modified, set));
    }

    /// Drop entries for files that are no longer listed.
    pub fn retain_paths(&self, live: &[PathBuf]) -> usize {
        let live: HashSet<&PathBuf> = live.iter().collect();
        let stale: Vec<Arc<PathBuf>> = self
            .inner
            .iter()
            .map(|(k, _)| k)
            .filter(|k| !live.contains(&**k))
            .collect();
        for key in &stale {
            self.inner.invalidate(&**key);
        }
        if !stale.is_empty() {
            debug!(dropped = stale.len(), "evicted vanished workbooks");
        }
        stale.len()
    }

    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Single-bucket cache for the external series, expiring after `ttl`.
pub fn external_cache(ttl: Duration) -> Cache<(), Arc<ExternalSeries>> {
    Cache::builder().max_capacity(1).time_to_live(ttl).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn set(msg: &str) -> Arc<SheetSet> {
        Arc::new(SheetSet::failure(msg))
    }

    #[test]
    fn edits_replace_the_entry() {
        let cache = SheetCache::new(SHEET_CACHE_CAPACITY);
        let path = PathBuf::from("/data/milho.xls");
        let t0 = SystemTime::UNIX_EPOCH;

        for i in 0..100u64 {
            let stamp = Some(t0 + Duration::from_secs(i));
            assert!(cache.get(&path, stamp).is_none());
            cache.insert(path.clone(), stamp, set("v"));
            assert!(cache.get(&path, stamp).is_some());
        }
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&path, Some(t0)).is_none());
    }

    #[test]
    fn vanished_files_are_dropped() {
        let cache = SheetCache::new(SHEET_CACHE_CAPACITY);
        let a = PathBuf::from("a.xls");
        let b = PathBuf::from("b.xls");
        cache.insert(a.clone(), None, set("a"));
        cache.insert(b.clone(), None, set("b"));

        assert_eq!(cache.retain_paths(&[b.clone()]), 1);
        assert!(cache.get(&a, None).is_none());
        assert_eq!(cache.get(&b, None).unwrap().error().as_deref(), Some("b"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn external_series_expires() {
        let cache = external_cache(Duration::from_millis(50));
        let series = Arc::new(ExternalSeries {
            table: Default::default(),
            is_placeholder: true,
            error: None,
        });
        cache.insert((), series);
        assert!(cache.get(&()).is_some());
        thread::sleep(Duration::from_millis(120));
        assert!(cache.get(&()).is_none());
    }
}
