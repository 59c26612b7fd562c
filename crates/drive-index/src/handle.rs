//! Async facade over [`DriveIndex`] for hosts running on tokio.
//!
//! SQLite calls block, so every method moves the work onto the blocking
//! pool with `spawn_blocking` and awaits it.

use std::sync::Arc;

use drive_shared::{FileId, MemberId, TagId};

use crate::cursor::BatchCursor;
use crate::database::DriveIndex;
use crate::error::{Result, StoreError};
use crate::models::{EntryUpdate, MainEntry, NewEntry};
use crate::query::{ModifiedBatch, QueryBatchResult, QueryFilter};

#[derive(Clone)]
pub struct AsyncDriveIndex {
    index: Arc<DriveIndex>,
}

impl AsyncDriveIndex {
    pub fn new(index: Arc<DriveIndex>) -> Self {
        Self { index }
    }

    /// The shared synchronous index.
    pub fn inner(&self) -> Arc<DriveIndex> {
        Arc::clone(&self.index)
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&DriveIndex) -> Result<T> + Send + 'static,
    {
        let index = Arc::clone(&self.index);
        tokio::task::spawn_blocking(move || f(&*index))
            .await
            .map_err(|e| StoreError::Task(format!("Task join error: {}", e)))?
    }

    pub async fn add_entry(&self, entry: NewEntry) -> Result<()> {
        self.run(move |index| index.add_entry(&entry)).await
    }

    pub async fn update_entry(&self, file_id: FileId, update: EntryUpdate) -> Result<()> {
        self.run(move |index| index.update_entry(&file_id, &update)).await
    }

    pub async fn replace_lists(
        &self,
        file_id: FileId,
        acl: Vec<MemberId>,
        tags: Vec<TagId>,
    ) -> Result<()> {
        self.run(move |index| index.replace_lists(&file_id, &acl, &tags))
            .await
    }

    pub async fn delete_entry(&self, file_id: FileId) -> Result<bool> {
        self.run(move |index| index.delete_entry(&file_id)).await
    }

    pub async fn get_main(&self, file_id: FileId) -> Result<Option<MainEntry>> {
        self.run(move |index| index.get_main(&file_id)).await
    }

    pub async fn get_acl(&self, file_id: FileId) -> Result<Vec<MemberId>> {
        self.run(move |index| index.get_acl(&file_id)).await
    }

    pub async fn get_tags(&self, file_id: FileId) -> Result<Vec<TagId>> {
        self.run(move |index| index.get_tags(&file_id)).await
    }

    pub async fn query_batch(
        &self,
        limit: usize,
        start_after: Option<FileId>,
        stop_at: Option<FileId>,
        filter: QueryFilter,
    ) -> Result<QueryBatchResult> {
        self.run(move |index| {
            index.query_batch(limit, start_after.as_ref(), stop_at.as_ref(), &filter)
        })
        .await
    }

    /// Returns the page together with the advanced cursor.
    pub async fn query_batch_cursor(
        &self,
        limit: usize,
        mut cursor: BatchCursor,
        filter: QueryFilter,
    ) -> Result<(QueryBatchResult, BatchCursor)> {
        self.run(move |index| {
            let page = index.query_batch_cursor(limit, &mut cursor, &filter)?;
            Ok((page, cursor))
        })
        .await
    }

    pub async fn query_modified(
        &self,
        limit: usize,
        since: u64,
        filter: QueryFilter,
    ) -> Result<ModifiedBatch> {
        self.run(move |index| index.query_modified(limit, since, &filter))
            .await
    }

    pub async fn begin_batch(&self) -> Result<()> {
        self.run(|index| index.begin_batch()).await
    }

    pub async fn commit(&self) -> Result<()> {
        self.run(|index| index.commit()).await
    }
}
