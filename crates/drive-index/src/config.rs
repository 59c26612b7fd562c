//! Index configuration, loaded from the environment.

use std::path::PathBuf;

use crate::models::IndexKind;

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Database file. `None` means the platform data directory
    /// (see [`DriveIndex::default_location`](crate::DriveIndex::default_location)).
    pub location: Option<PathBuf>,
    pub kind: IndexKind,
    /// Main-entry cache size; 0 disables the cache.
    pub cache_capacity: usize,
    /// How long SQLite waits on a locked database before failing.
    pub busy_timeout_ms: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            location: None,
            kind: IndexKind::TimeSeries,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl IndexConfig {
    pub fn new(location: impl Into<PathBuf>, kind: IndexKind) -> Self {
        Self {
            location: Some(location.into()),
            kind,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// * `DRIVE_INDEX_PATH`
    /// * `DRIVE_INDEX_KIND` - `timeseries` or `unordered`
    /// * `DRIVE_INDEX_CACHE_CAPACITY`
    /// * `DRIVE_INDEX_BUSY_TIMEOUT_MS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("DRIVE_INDEX_PATH") {
            config.location = Some(PathBuf::from(path));
        }

        if let Some(val) = lookup("DRIVE_INDEX_KIND") {
            match IndexKind::parse(&val) {
                Some(kind) => config.kind = kind,
                None => {
                    tracing::warn!(value = %val, "Invalid DRIVE_INDEX_KIND, using default");
                }
            }
        }

        if let Some(val) = lookup("DRIVE_INDEX_CACHE_CAPACITY") {
            match val.parse::<usize>() {
                Ok(n) => config.cache_capacity = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid DRIVE_INDEX_CACHE_CAPACITY, using default");
                }
            }
        }

        if let Some(val) = lookup("DRIVE_INDEX_BUSY_TIMEOUT_MS") {
            match val.parse::<u64>() {
                Ok(n) => config.busy_timeout_ms = n,
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid DRIVE_INDEX_BUSY_TIMEOUT_MS, using default");
                }
            }
        }

        config
    }
}
