//! # drive-index
//!
//! Per-drive secondary index and query engine, backed by SQLite.
//!
//! Each drive item has one row in the main index, keyed by its time-ordered
//! [`FileId`](drive_shared::FileId), plus any number of ACL members and tags
//! in two secondary indexes. The crate exposes a synchronous [`DriveIndex`]
//! handle that owns the `rusqlite::Connection`, typed writers that keep the
//! three tables consistent, and a query engine with cursor pagination and
//! modification-time delta scans. [`AsyncDriveIndex`] wraps it for tokio
//! hosts.

pub mod cache;
pub mod config;
pub mod cursor;
pub mod database;
pub mod entries;
pub mod handle;
pub mod main_index;
pub mod member_index;
pub mod migrations;
pub mod models;
pub mod query;

mod error;

pub use cache::CacheStats;
pub use config::IndexConfig;
pub use cursor::BatchCursor;
pub use database::DriveIndex;
pub use error::{Result, StoreError};
pub use handle::AsyncDriveIndex;
pub use member_index::{MemberIndex, ACL_INDEX, TAG_INDEX};
pub use models::*;
pub use query::{ModifiedBatch, QueryBatchResult, QueryFilter, TagFilter, UserDateRange};
