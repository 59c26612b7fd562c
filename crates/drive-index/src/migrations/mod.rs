//! Database migration runner.
//!
//! Migrations run on every [`DriveIndex::open`](crate::DriveIndex::open) and
//! on [`create_schema`](crate::DriveIndex::create_schema). The version check
//! and the DDL execute inside one `BEGIN IMMEDIATE` transaction, so several
//! openers racing on a fresh file serialize on SQLite's write lock and the
//! losers find the schema already in place.

pub mod v001_initial;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use crate::error::{Result, StoreError};
use crate::models::IndexKind;

/// Current schema version.  Bump this and add a new migration module whenever
/// the schema changes.
const CURRENT_VERSION: u32 = 1;

/// Tables dropped by a schema reset, in dependency-free order.
const TABLES: [&str; 4] = ["aclindex", "tagindex", "mainindex", "indexmeta"];

/// Run all pending migrations and check the stored kind matches `kind`.
pub fn run_migrations(conn: &mut Connection, kind: IndexKind) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current: u32 = tx.pragma_query_value(None, "user_version", |row| row.get(0))?;

    tracing::info!(
        current_version = current,
        target_version = CURRENT_VERSION,
        "checking drive index migrations"
    );

    if current < 1 {
        tracing::info!(%kind, "applying migration v001_initial");
        v001_initial::up(&tx, kind).map_err(|e| StoreError::Migration(e.to_string()))?;
        tx.pragma_update(None, "user_version", 1)?;
    }

    let stored: Option<String> = tx
        .query_row("SELECT value FROM indexmeta WHERE key = 'kind'", [], |row| row.get(0))
        .optional()?;
    let stored = match stored.as_deref().map(IndexKind::parse) {
        Some(Some(stored)) => stored,
        Some(None) => {
            return Err(StoreError::Migration(format!(
                "unrecognised index kind {:?}",
                stored.unwrap_or_default()
            )))
        }
        None => return Err(StoreError::Migration("index kind missing".into())),
    };
    if stored != kind {
        return Err(StoreError::KindMismatch {
            stored,
            requested: kind,
        });
    }

    tx.commit()?;
    Ok(())
}

/// Drop every drive-index table and reset the schema version.
pub fn drop_all(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for table in TABLES {
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;
    }
    tx.pragma_update(None, "user_version", 0)?;
    tx.commit()?;
    tracing::info!("dropped drive index tables");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn, IndexKind::TimeSeries).unwrap();
        run_migrations(&mut conn, IndexKind::TimeSeries).unwrap();

        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn kind_is_fixed_at_creation() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn, IndexKind::Unordered).unwrap();
        let err = run_migrations(&mut conn, IndexKind::TimeSeries).unwrap_err();
        assert!(matches!(
            err,
            StoreError::KindMismatch {
                stored: IndexKind::Unordered,
                requested: IndexKind::TimeSeries
            }
        ));
    }

    #[test]
    fn drop_all_resets_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn, IndexKind::TimeSeries).unwrap();
        drop_all(&mut conn).unwrap();
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 0);

        // A reset index may be recreated under the other kind.
        run_migrations(&mut conn, IndexKind::Unordered).unwrap();
    }
}
