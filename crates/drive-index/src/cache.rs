//! Per-instance cache of main entries.
//!
//! Owned by one [`DriveIndex`](crate::DriveIndex) and only touched under its
//! connection lock, so it needs no synchronisation of its own. Every write
//! path invalidates the affected id before releasing the lock. Commits made
//! through other connections are detected by SQLite's `data_version` and
//! drop the whole cache.

use std::num::NonZeroUsize;

use drive_shared::FileId;
use lru::LruCache;

use crate::models::MainEntry;

pub struct EntryCache {
    entries: Option<LruCache<FileId, MainEntry>>,
    capacity: usize,
    hit_count: u64,
    miss_count: u64,
    data_version: Option<i64>,
}

impl EntryCache {
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize) -> Self {
        EntryCache {
            entries: NonZeroUsize::new(capacity).map(LruCache::new),
            capacity,
            hit_count: 0,
            miss_count: 0,
            data_version: None,
        }
    }

    /// Record the connection's current `data_version`, clearing the cache if
    /// another connection has committed since the last call.
    pub fn sync_data_version(&mut self, version: i64) {
        if self.data_version.is_some_and(|seen| seen != version) {
            self.clear();
        }
        self.data_version = Some(version);
    }

    pub fn get(&mut self, file_id: &FileId) -> Option<MainEntry> {
        let cache = self.entries.as_mut()?;
        match cache.get(file_id) {
            Some(entry) => {
                self.hit_count += 1;
                Some(entry.clone())
            }
            None => {
                self.miss_count += 1;
                None
            }
        }
    }

    pub fn put(&mut self, entry: MainEntry) {
        if let Some(cache) = self.entries.as_mut() {
            cache.put(entry.file_id, entry);
        }
    }

    pub fn invalidate(&mut self, file_id: &FileId) {
        if let Some(cache) = self.entries.as_mut() {
            cache.pop(file_id);
        }
    }

    pub fn clear(&mut self) {
        if let Some(cache) = self.entries.as_mut() {
            cache.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count,
            miss_count: self.miss_count,
            size: self.entries.as_ref().map_or(0, LruCache::len),
            capacity: self.capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}
