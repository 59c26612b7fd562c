//! Main metadata table: one row per file.
//!
//! Plain functions over a connection. Callers own transaction scope; every
//! function here runs inside whatever savepoint the caller opened.

use drive_shared::{ByteId, FileId};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{classify, Result, StoreError};
use crate::models::{MainEntry, MainPatch, NewEntry};

pub(crate) const TABLE: &str = "mainindex";

const SELECT_COLUMNS: &str = "fileid, createdtimestamp, updatedtimestamp, filetype, datatype, \
     senderid, threadid, userdate, isarchived, ishistory, requiredsecuritygroup";

/// SQLite integers are signed; larger values are clamped on the way in.
pub(crate) fn to_sql_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn from_sql_u64(value: i64) -> u64 {
    value.max(0) as u64
}

pub fn get(conn: &Connection, file_id: &FileId) -> Result<Option<MainEntry>> {
    let entry = conn
        .query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM mainindex WHERE fileid = ?1"),
            params![file_id.as_bytes().as_slice()],
            row_to_entry,
        )
        .optional()?;
    Ok(entry)
}

pub fn exists(conn: &Connection, file_id: &FileId) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM mainindex WHERE fileid = ?1",
            params![file_id.as_bytes().as_slice()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Insert a fresh row. `created_at` is `created_at_secs`, `updated_at` is 0.
pub fn insert(conn: &Connection, entry: &NewEntry, created_at_secs: u64) -> Result<()> {
    conn.execute(
        "INSERT INTO mainindex (fileid, createdtimestamp, updatedtimestamp, filetype, datatype,
                                senderid, threadid, userdate, isarchived, ishistory,
                                requiredsecuritygroup)
         VALUES (?1, ?2, 0, ?3, ?4, ?5, ?6, ?7, 0, 0, ?8)",
        params![
            entry.file_id.as_bytes().as_slice(),
            to_sql_u64(created_at_secs),
            entry.file_type,
            entry.data_type,
            entry.sender_id.as_ref().map(|id| id.as_bytes().to_vec()),
            entry.thread_id.as_ref().map(|id| id.as_bytes().to_vec()),
            to_sql_u64(entry.user_date),
            entry.required_security_group,
        ],
    )
    .map_err(|e| classify(e, TABLE, &entry.file_id))?;
    Ok(())
}

/// Apply the present fields of `patch` and set `updatedtimestamp` to
/// `modified_millis`.
pub fn update(
    conn: &Connection,
    file_id: &FileId,
    patch: &MainPatch,
    modified_millis: u64,
) -> Result<()> {
    let mut sets: Vec<&'static str> = vec!["updatedtimestamp = ?"];
    let mut values: Vec<rusqlite::types::Value> =
        vec![rusqlite::types::Value::Integer(to_sql_u64(modified_millis))];

    if let Some(v) = patch.file_type {
        sets.push("filetype = ?");
        values.push(i64::from(v).into());
    }
    if let Some(v) = patch.data_type {
        sets.push("datatype = ?");
        values.push(i64::from(v).into());
    }
    if let Some(v) = patch.sender_id {
        sets.push("senderid = ?");
        values.push(v.as_bytes().to_vec().into());
    }
    if let Some(v) = patch.thread_id {
        sets.push("threadid = ?");
        values.push(v.as_bytes().to_vec().into());
    }
    if let Some(v) = patch.user_date {
        sets.push("userdate = ?");
        values.push(to_sql_u64(v).into());
    }
    if let Some(v) = patch.is_archived {
        sets.push("isarchived = ?");
        values.push(i64::from(v).into());
    }
    if let Some(v) = patch.is_history {
        sets.push("ishistory = ?");
        values.push(i64::from(v).into());
    }
    if let Some(v) = patch.required_security_group {
        sets.push("requiredsecuritygroup = ?");
        values.push(i64::from(v).into());
    }
    values.push(file_id.as_bytes().to_vec().into());

    let sql = format!("UPDATE mainindex SET {} WHERE fileid = ?", sets.join(", "));
    let affected = conn
        .execute(&sql, rusqlite::params_from_iter(values))
        .map_err(|e| classify(e, TABLE, file_id))?;
    if affected == 0 {
        return Err(StoreError::NotFound(*file_id));
    }
    Ok(())
}

/// Refresh `updatedtimestamp` only.
pub fn touch(conn: &Connection, file_id: &FileId, modified_millis: u64) -> Result<()> {
    update(conn, file_id, &MainPatch::default(), modified_millis)
}

/// Remove the main row. Secondary index rows are left alone.
pub fn delete(conn: &Connection, file_id: &FileId) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM mainindex WHERE fileid = ?1",
        params![file_id.as_bytes().as_slice()],
    )?;
    Ok(affected > 0)
}

pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM mainindex", [], |row| row.get(0))?;
    Ok(from_sql_u64(n))
}

/// Decode a 16-byte id column.
pub(crate) fn id_column<T: ByteId>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let bytes: Vec<u8> = row.get(idx)?;
    T::from_slice(&bytes)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))
}

fn optional_id_column<T: ByteId>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let bytes: Option<Vec<u8>> = row.get(idx)?;
    bytes
        .map(|b| {
            T::from_slice(&b).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e))
            })
        })
        .transpose()
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<MainEntry> {
    Ok(MainEntry {
        file_id: id_column(row, 0)?,
        created_at: from_sql_u64(row.get(1)?),
        updated_at: from_sql_u64(row.get(2)?),
        file_type: row.get(3)?,
        data_type: row.get(4)?,
        sender_id: optional_id_column(row, 5)?,
        thread_id: optional_id_column(row, 6)?,
        user_date: from_sql_u64(row.get(7)?),
        is_archived: row.get(8)?,
        is_history: row.get(9)?,
        required_security_group: row.get(10)?,
    })
}
