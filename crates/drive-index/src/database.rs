//! Connection management for one drive's index.
//!
//! The [`DriveIndex`] struct owns a [`rusqlite::Connection`] behind a mutex
//! and guarantees that migrations are run before any other operation. Every
//! write runs under the lock inside its own savepoint, so a half-applied
//! add or update is never visible to another caller.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use directories::ProjectDirs;
use drive_shared::{time, FileId, MemberId, TagId};
use rusqlite::Connection;

use crate::cache::{CacheStats, EntryCache};
use crate::config::IndexConfig;
use crate::error::{Result, StoreError};
use crate::member_index::{ACL_INDEX, TAG_INDEX};
use crate::models::{IndexKind, MainEntry};
use crate::{main_index, migrations};

pub(crate) struct Inner {
    pub(crate) conn: Connection,
    pub(crate) cache: EntryCache,
}

/// Handle to one drive's index database. `Send + Sync`; share it via `Arc`.
pub struct DriveIndex {
    inner: Mutex<Inner>,
    kind: IndexKind,
    location: PathBuf,
}

impl DriveIndex {
    /// Platform data-directory location used when no path is configured:
    /// - Linux:   `~/.local/share/drive-index/drive-index.db`
    /// - macOS:   `~/Library/Application Support/com.drive.drive-index/drive-index.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\drive\drive-index\data\drive-index.db`
    pub fn default_location() -> Result<PathBuf> {
        let project_dirs =
            ProjectDirs::from("com", "drive", "drive-index").ok_or(StoreError::NoDataDir)?;
        Ok(project_dirs.data_dir().join("drive-index.db"))
    }

    /// Open (or create) an index at `location` with default settings.
    pub fn open(location: impl AsRef<Path>, kind: IndexKind) -> Result<Self> {
        Self::open_with(IndexConfig::new(location.as_ref(), kind))
    }

    /// Open (or create) an index as described by `config`.
    ///
    /// Fails with [`StoreError::KindMismatch`] if the file was created under
    /// the other ordering kind.
    pub fn open_with(config: IndexConfig) -> Result<Self> {
        let location = match config.location {
            Some(path) => path,
            None => Self::default_location()?,
        };
        if let Some(parent) = location.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::info!(path = %location.display(), kind = %config.kind, "opening drive index");

        let mut conn = Connection::open(&location)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        migrations::run_migrations(&mut conn, config.kind)?;

        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                cache: EntryCache::new(config.cache_capacity),
            }),
            kind: config.kind,
            location,
        })
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Create the schema if missing. With `drop_existing` every table is
    /// dropped first and the file is vacuumed afterwards.
    pub fn create_schema(&self, drop_existing: bool) -> Result<()> {
        let mut guard = self.lock();
        if !guard.conn.is_autocommit() {
            return Err(StoreError::TransactionInProgress);
        }
        if drop_existing {
            migrations::drop_all(&mut guard.conn)?;
            guard.cache.clear();
        }
        migrations::run_migrations(&mut guard.conn, self.kind)?;
        if drop_existing {
            guard.conn.execute_batch("VACUUM")?;
            tracing::info!(path = %self.location.display(), "drive index schema recreated");
        }
        Ok(())
    }

    /// Open an outer transaction. Adds and updates until [`commit`](Self::commit)
    /// nest inside it and become durable together.
    pub fn begin_batch(&self) -> Result<()> {
        let guard = self.lock();
        if !guard.conn.is_autocommit() {
            return Err(StoreError::TransactionInProgress);
        }
        guard.conn.execute_batch("BEGIN IMMEDIATE")?;
        tracing::debug!("batch opened");
        Ok(())
    }

    /// Flush the open batch. A no-op when none is open.
    pub fn commit(&self) -> Result<()> {
        let guard = self.lock();
        if guard.conn.is_autocommit() {
            return Ok(());
        }
        guard.conn.execute_batch("COMMIT")?;
        tracing::debug!("batch committed");
        Ok(())
    }

    /// Discard the open batch. A no-op when none is open.
    pub fn rollback(&self) -> Result<()> {
        let mut guard = self.lock();
        // Reads inside the batch may have cached uncommitted rows.
        guard.cache.clear();
        if guard.conn.is_autocommit() {
            return Ok(());
        }
        guard.conn.execute_batch("ROLLBACK")?;
        tracing::debug!("batch rolled back");
        Ok(())
    }

    pub fn in_batch(&self) -> bool {
        !self.lock().conn.is_autocommit()
    }

    pub fn vacuum(&self) -> Result<()> {
        let guard = self.lock();
        if !guard.conn.is_autocommit() {
            return Err(StoreError::TransactionInProgress);
        }
        guard.conn.execute_batch("VACUUM")?;
        Ok(())
    }

    /// Current value of the modification clock. Anything modified after this
    /// call carries a strictly larger `updated_at`.
    pub fn current_timestamp(&self) -> u64 {
        time::unique_unix_millis()
    }

    pub fn count(&self) -> Result<u64> {
        self.read(|conn, _| main_index::count(conn))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.lock().cache.stats()
    }

    /// Relative directory under which a payload for `file_id` can be stored.
    ///
    /// Time-series drives bucket by creation day (`yyyy/mm/dd`); unordered
    /// drives spread files over 256 buckets keyed by the last random byte.
    pub fn file_id_to_path(&self, file_id: &FileId) -> String {
        match self.kind {
            IndexKind::TimeSeries => time::datetime_from_millis(file_id.unix_millis())
                .map(|dt| dt.format("%Y/%m/%d").to_string())
                .unwrap_or_else(|| nibble_path(file_id)),
            IndexKind::Unordered => nibble_path(file_id),
        }
    }

    // -- Getters ----------------------------------------------------------

    pub fn get_main(&self, file_id: &FileId) -> Result<Option<MainEntry>> {
        self.read(|conn, cache| {
            if let Some(entry) = cache.get(file_id) {
                return Ok(Some(entry));
            }
            let entry = main_index::get(conn, file_id)?;
            if let Some(entry) = &entry {
                cache.put(entry.clone());
            }
            Ok(entry)
        })
    }

    pub fn get_acl(&self, file_id: &FileId) -> Result<Vec<MemberId>> {
        self.read(|conn, _| ACL_INDEX.get(conn, file_id))
    }

    pub fn get_tags(&self, file_id: &FileId) -> Result<Vec<TagId>> {
        self.read(|conn, _| TAG_INDEX.get(conn, file_id))
    }

    // -- Internals --------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic mid-write leaves the savepoint to roll back on drop, so the
        // connection itself is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&Connection, &mut EntryCache) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock();
        let Inner { conn, cache } = &mut *guard;
        cache.sync_data_version(data_version(conn)?);
        f(&*conn, cache)
    }

    /// Run `f` as one atomic unit: committed on `Ok`, rolled back on `Err`.
    /// Inside an open batch the unit is a nested savepoint.
    pub(crate) fn write<T>(
        &self,
        f: impl FnOnce(&Connection, &mut EntryCache) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self.lock();
        let Inner { conn, cache } = &mut *guard;
        let sp = conn.savepoint()?;
        let value = f(&*sp, cache)?;
        sp.commit()?;
        Ok(value)
    }
}

/// Changes whenever another connection commits to the same file.
fn data_version(conn: &Connection) -> Result<i64> {
    Ok(conn.pragma_query_value(None, "data_version", |row| row.get(0))?)
}

fn nibble_path(file_id: &FileId) -> String {
    let last = file_id.0[file_id.0.len() - 1];
    format!("{:x}/{:x}", last >> 4, last & 0x0f)
}
