//! Multi-valued secondary indexes: `(file id, member)` pairs.
//!
//! The ACL and tag indexes have the same shape and differ only in table,
//! column and member type, so one generic [`MemberIndex`] serves both.

use std::collections::HashSet;
use std::marker::PhantomData;

use drive_shared::{ByteId, FileId, MemberId, TagId};
use rusqlite::{params, Connection};

use crate::error::{classify, Result, StoreError};
use crate::main_index::id_column;

#[derive(Debug)]
pub struct MemberIndex<T> {
    table: &'static str,
    column: &'static str,
    _member: PhantomData<fn() -> T>,
}

/// Which members may see a file.
pub const ACL_INDEX: MemberIndex<MemberId> = MemberIndex::new("aclindex", "aclmember");

/// Which tags a file carries.
pub const TAG_INDEX: MemberIndex<TagId> = MemberIndex::new("tagindex", "tagid");

impl<T> MemberIndex<T> {
    const fn new(table: &'static str, column: &'static str) -> Self {
        Self {
            table,
            column,
            _member: PhantomData,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn column(&self) -> &'static str {
        self.column
    }
}

impl<T: ByteId> MemberIndex<T> {
    /// Members of `file_id`, ascending. Empty when none are stored.
    pub fn get(&self, conn: &Connection, file_id: &FileId) -> Result<Vec<T>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {col} FROM {table} WHERE fileid = ?1 ORDER BY {col}",
            col = self.column,
            table = self.table
        ))?;
        let rows = stmt.query_map(params![file_id.as_bytes().as_slice()], |row| id_column(row, 0))?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    /// Initial population for a file. Fails if the file already has any
    /// rows here or `members` repeats itself; nothing is written on failure.
    pub fn insert_many(&self, conn: &Connection, file_id: &FileId, members: &[T]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        self.reject_repeats(file_id, members)?;

        let existing: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE fileid = ?1", self.table),
            params![file_id.as_bytes().as_slice()],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(self.duplicate(file_id));
        }

        self.insert_rows(conn, file_id, members)
    }

    /// Differential add. Fails if any pair already exists or `members`
    /// repeats itself.
    ///
    /// On failure rows from this call may already be written; callers run it
    /// inside a savepoint that is rolled back on error.
    pub fn add(&self, conn: &Connection, file_id: &FileId, members: &[T]) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        self.reject_repeats(file_id, members)?;
        self.insert_rows(conn, file_id, members)
    }

    /// Remove exactly these pairs. Absent pairs are ignored.
    pub fn delete(&self, conn: &Connection, file_id: &FileId, members: &[T]) -> Result<usize> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut stmt = conn.prepare_cached(&format!(
            "DELETE FROM {} WHERE fileid = ?1 AND {} = ?2",
            self.table, self.column
        ))?;
        let mut removed = 0;
        for member in members {
            removed += stmt.execute(params![
                file_id.as_bytes().as_slice(),
                member.as_bytes().as_slice()
            ])?;
        }
        Ok(removed)
    }

    pub fn delete_all(&self, conn: &Connection, file_id: &FileId) -> Result<usize> {
        let removed = conn.execute(
            &format!("DELETE FROM {} WHERE fileid = ?1", self.table),
            params![file_id.as_bytes().as_slice()],
        )?;
        Ok(removed)
    }

    fn insert_rows(&self, conn: &Connection, file_id: &FileId, members: &[T]) -> Result<()> {
        let mut stmt = conn.prepare_cached(&format!(
            "INSERT INTO {} (fileid, {}) VALUES (?1, ?2)",
            self.table, self.column
        ))?;
        for member in members {
            stmt.execute(params![
                file_id.as_bytes().as_slice(),
                member.as_bytes().as_slice()
            ])
            .map_err(|e| classify(e, self.table, file_id))?;
        }
        Ok(())
    }

    fn reject_repeats(&self, file_id: &FileId, members: &[T]) -> Result<()> {
        let mut seen = HashSet::with_capacity(members.len());
        if members.iter().all(|m| seen.insert(*m)) {
            Ok(())
        } else {
            Err(self.duplicate(file_id))
        }
    }

    fn duplicate(&self, file_id: &FileId) -> StoreError {
        StoreError::DuplicateKey {
            table: self.table,
            file_id: *file_id,
        }
    }
}
