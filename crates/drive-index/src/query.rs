//! Query engine: batch scans by position and delta scans by modification
//! time, both narrowed by a [`QueryFilter`].
//!
//! Facets combine with AND; values within a facet combine with OR, except
//! [`TagFilter::AllOf`]. A facet that is `None` or an empty list does not
//! constrain the scan.

use std::collections::BTreeSet;
use std::time::Instant;

use drive_shared::{time, ByteId, FileId, MemberId, SenderId, TagId, ThreadId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::database::DriveIndex;
use crate::error::{Result, StoreError};
use crate::main_index::{from_sql_u64, id_column, to_sql_u64};
use crate::models::IndexKind;

/// Inclusive range over `user_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDateRange {
    pub start: u64,
    pub end: u64,
}

impl UserDateRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(StoreError::InvalidQuery(format!(
                "user_date start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagFilter {
    /// Entries carrying at least one of the tags.
    AnyOf(Vec<TagId>),
    /// Entries carrying every one of the tags. An empty set matches all.
    AllOf(Vec<TagId>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub file_types: Option<Vec<i32>>,
    pub data_types: Option<Vec<i32>>,
    pub sender_ids: Option<Vec<SenderId>>,
    pub thread_ids: Option<Vec<ThreadId>>,
    pub user_date: Option<UserDateRange>,
    pub tags: Option<TagFilter>,
    pub acl_any_of: Option<Vec<MemberId>>,
}

/// One page of a batch scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryBatchResult {
    pub ids: Vec<FileId>,
    /// First id of this page, `None` if the page is empty.
    pub first_cursor: Option<FileId>,
    /// Resume point for the next page; `None` once the scan is exhausted.
    pub last_cursor: Option<FileId>,
    /// Modification clock at call time, for seeding `query_modified`.
    pub cursor_timestamp: u64,
}

impl QueryBatchResult {
    fn exhausted(cursor_timestamp: u64) -> Self {
        Self {
            ids: Vec::new(),
            first_cursor: None,
            last_cursor: None,
            cursor_timestamp,
        }
    }
}

/// One page of a delta scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedBatch {
    pub ids: Vec<FileId>,
    /// Pass back as `since` for the next page.
    pub last_cursor: u64,
}

// ---------------------------------------------------------------------------
// WHERE clause builder
// ---------------------------------------------------------------------------

#[derive(Default)]
struct WhereClause {
    terms: Vec<String>,
    params: Vec<Value>,
}

impl WhereClause {
    /// Bind a value and return its placeholder.
    fn bind(&mut self, value: impl Into<Value>) -> String {
        self.params.push(value.into());
        format!("?{}", self.params.len())
    }

    fn push(&mut self, term: impl Into<String>) {
        self.terms.push(term.into());
    }

    fn placeholders(&mut self, values: impl IntoIterator<Item = Value>) -> Vec<String> {
        values.into_iter().map(|v| self.bind(v)).collect()
    }

    fn in_list(&mut self, column: &str, values: impl IntoIterator<Item = Value>) {
        let holders = self.placeholders(values);
        if !holders.is_empty() {
            self.push(format!("{column} IN ({})", holders.join(", ")));
        }
    }

    /// `fileid IN (SELECT fileid FROM table WHERE column IN (...))`
    fn member_any_of<T: ByteId>(&mut self, table: &str, column: &str, members: &[T]) {
        let holders = self.placeholders(members.iter().map(blob));
        if !holders.is_empty() {
            self.push(format!(
                "fileid IN (SELECT fileid FROM {table} WHERE {column} IN ({}))",
                holders.join(", ")
            ));
        }
    }

    fn member_all_of<T: ByteId>(&mut self, table: &str, column: &str, members: &[T]) {
        let distinct: BTreeSet<T> = members.iter().copied().collect();
        if distinct.is_empty() {
            return;
        }
        let holders = self.placeholders(distinct.iter().map(blob));
        let n = self.bind(distinct.len() as i64);
        self.push(format!(
            "fileid IN (SELECT fileid FROM {table} WHERE {column} IN ({}) \
             GROUP BY fileid HAVING COUNT(*) = {n})",
            holders.join(", ")
        ));
    }

    fn apply_filter(&mut self, filter: &QueryFilter) -> Result<()> {
        if let Some(types) = &filter.file_types {
            self.in_list("filetype", types.iter().map(|t| Value::Integer(i64::from(*t))));
        }
        if let Some(types) = &filter.data_types {
            self.in_list("datatype", types.iter().map(|t| Value::Integer(i64::from(*t))));
        }
        if let Some(senders) = &filter.sender_ids {
            self.in_list("senderid", senders.iter().map(blob));
        }
        if let Some(threads) = &filter.thread_ids {
            self.in_list("threadid", threads.iter().map(blob));
        }
        if let Some(range) = &filter.user_date {
            range.validate()?;
            let start = self.bind(to_sql_u64(range.start));
            let end = self.bind(to_sql_u64(range.end));
            self.push(format!("userdate BETWEEN {start} AND {end}"));
        }
        match &filter.tags {
            Some(TagFilter::AnyOf(tags)) => self.member_any_of("tagindex", "tagid", tags),
            Some(TagFilter::AllOf(tags)) => self.member_all_of("tagindex", "tagid", tags),
            None => {}
        }
        if let Some(acl) = &filter.acl_any_of {
            self.member_any_of("aclindex", "aclmember", acl);
        }
        Ok(())
    }

    fn sql(&self) -> String {
        if self.terms.is_empty() {
            String::new()
        } else {
            format!("WHERE {} ", self.terms.join(" AND "))
        }
    }
}

fn blob<T: ByteId>(id: &T) -> Value {
    Value::Blob(id.as_bytes().to_vec())
}

fn check_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(StoreError::InvalidQuery("limit must be at least 1".into()));
    }
    Ok(())
}

/// Storage row of `file_id` in an unordered index.
fn row_number(conn: &Connection, file_id: &FileId) -> Result<Option<i64>> {
    let rowno = conn
        .query_row(
            "SELECT rowno FROM mainindex WHERE fileid = ?1",
            params![file_id.as_bytes().as_slice()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(rowno)
}

// ---------------------------------------------------------------------------
// Scans
// ---------------------------------------------------------------------------

impl DriveIndex {
    /// Newest-first page of ids (storage order for unordered indexes).
    ///
    /// `start_after` resumes below a previous page's `last_cursor`;
    /// `stop_at` excludes that id and everything older. Both are exclusive.
    ///
    /// Unordered indexes resolve cursors to storage rows. An unknown
    /// `start_after` yields an exhausted page; an unknown `stop_at` (a
    /// deleted row, or a time bound from [`BatchCursor::stop_at_time`])
    /// falls back to comparing file ids, i.e. creation time.
    ///
    /// [`BatchCursor::stop_at_time`]: crate::BatchCursor::stop_at_time
    pub fn query_batch(
        &self,
        limit: usize,
        start_after: Option<&FileId>,
        stop_at: Option<&FileId>,
        filter: &QueryFilter,
    ) -> Result<QueryBatchResult> {
        check_limit(limit)?;
        let kind = self.kind();
        let order = kind.order_column();

        let started = Instant::now();
        let result = self.read(|conn, _| {
            let cursor_timestamp = time::unique_unix_millis();
            let mut clause = WhereClause::default();

            let bounds = [(start_after, "<"), (stop_at, ">")];
            for (cursor, op) in bounds {
                let Some(cursor) = cursor else { continue };
                let (column, position) = match kind {
                    IndexKind::TimeSeries => (order, blob(cursor)),
                    IndexKind::Unordered => match row_number(conn, cursor)? {
                        Some(rowno) => (order, Value::Integer(rowno)),
                        None if op == ">" => ("fileid", blob(cursor)),
                        None => return Ok(QueryBatchResult::exhausted(cursor_timestamp)),
                    },
                };
                let holder = clause.bind(position);
                clause.push(format!("{column} {op} {holder}"));
            }
            clause.apply_filter(filter)?;

            let fetch = clause.bind(i64::try_from(limit).unwrap_or(i64::MAX).saturating_add(1));
            let sql = format!(
                "SELECT fileid FROM mainindex {}ORDER BY {order} DESC LIMIT {fetch}",
                clause.sql()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(clause.params.iter()), |row| id_column(row, 0))?;

            let mut ids: Vec<FileId> = Vec::with_capacity(limit.min(1024) + 1);
            for row in rows {
                ids.push(row?);
            }

            let more = ids.len() > limit;
            ids.truncate(limit);
            Ok(QueryBatchResult {
                first_cursor: ids.first().copied(),
                last_cursor: if more { ids.last().copied() } else { None },
                ids,
                cursor_timestamp,
            })
        })?;

        tracing::debug!(
            kind = %kind,
            limit,
            rows = result.ids.len(),
            exhausted = result.last_cursor.is_none(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "query_batch"
        );
        Ok(result)
    }

    /// Ids modified at or after `since`, oldest modification first.
    ///
    /// Entries never updated since insert are not returned. `since = 0`
    /// returns everything ever modified.
    pub fn query_modified(
        &self,
        limit: usize,
        since: u64,
        filter: &QueryFilter,
    ) -> Result<ModifiedBatch> {
        check_limit(limit)?;

        let started = Instant::now();
        let batch = self.read(|conn, _| {
            let mut clause = WhereClause::default();
            clause.push("updatedtimestamp > 0");
            let since_holder = clause.bind(to_sql_u64(since));
            clause.push(format!("updatedtimestamp >= {since_holder}"));
            clause.apply_filter(filter)?;

            let fetch = clause.bind(i64::try_from(limit).unwrap_or(i64::MAX));
            let sql = format!(
                "SELECT fileid, updatedtimestamp FROM mainindex {}\
                 ORDER BY updatedtimestamp ASC, fileid ASC LIMIT {fetch}",
                clause.sql()
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(clause.params.iter()), |row| {
                Ok((id_column::<FileId>(row, 0)?, from_sql_u64(row.get(1)?)))
            })?;

            let mut ids = Vec::new();
            let mut last_modified = None;
            for row in rows {
                let (id, modified) = row?;
                ids.push(id);
                last_modified = Some(modified);
            }

            Ok(ModifiedBatch {
                ids,
                last_cursor: last_modified.map_or(since, |m| m + 1),
            })
        })?;

        tracing::debug!(
            limit,
            since,
            rows = batch.ids.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "query_modified"
        );
        Ok(batch)
    }
}
