//! v001 -- Initial schema creation.
//!
//! Creates `mainindex`, `aclindex`, `tagindex` and `indexmeta`. The layout
//! of `mainindex` depends on the [`IndexKind`]: time-series indexes are
//! clustered by file id, unordered ones by an insertion row number.

use rusqlite::{params, Connection};

use crate::models::IndexKind;

const MAIN_TIMESERIES_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS mainindex (
    fileid                BLOB PRIMARY KEY NOT NULL CHECK (length(fileid) = 16),
    createdtimestamp      INTEGER NOT NULL,              -- unix seconds
    updatedtimestamp      INTEGER NOT NULL DEFAULT 0,    -- unique unix millis, 0 = never
    filetype              INTEGER NOT NULL,
    datatype              INTEGER NOT NULL,
    senderid              BLOB CHECK (senderid IS NULL OR length(senderid) = 16),
    threadid              BLOB CHECK (threadid IS NULL OR length(threadid) = 16),
    userdate              INTEGER NOT NULL,
    isarchived            INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    ishistory             INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    requiredsecuritygroup INTEGER NOT NULL
) WITHOUT ROWID;
"#;

const MAIN_UNORDERED_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS mainindex (
    rowno                 INTEGER PRIMARY KEY AUTOINCREMENT,  -- never reused
    fileid                BLOB UNIQUE NOT NULL CHECK (length(fileid) = 16),
    createdtimestamp      INTEGER NOT NULL,
    updatedtimestamp      INTEGER NOT NULL DEFAULT 0,
    filetype              INTEGER NOT NULL,
    datatype              INTEGER NOT NULL,
    senderid              BLOB CHECK (senderid IS NULL OR length(senderid) = 16),
    threadid              BLOB CHECK (threadid IS NULL OR length(threadid) = 16),
    userdate              INTEGER NOT NULL,
    isarchived            INTEGER NOT NULL DEFAULT 0,
    ishistory             INTEGER NOT NULL DEFAULT 0,
    requiredsecuritygroup INTEGER NOT NULL
);
"#;

const COMMON_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_mainindex_updated ON mainindex(updatedtimestamp);

-- ----------------------------------------------------------------
-- ACL membership: which members may see a file
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS aclindex (
    fileid    BLOB NOT NULL CHECK (length(fileid) = 16),
    aclmember BLOB NOT NULL CHECK (length(aclmember) = 16),
    PRIMARY KEY (fileid, aclmember)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_aclindex_member ON aclindex(aclmember);

-- ----------------------------------------------------------------
-- Tags
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS tagindex (
    fileid BLOB NOT NULL CHECK (length(fileid) = 16),
    tagid  BLOB NOT NULL CHECK (length(tagid) = 16),
    PRIMARY KEY (fileid, tagid)
) WITHOUT ROWID;

CREATE INDEX IF NOT EXISTS idx_tagindex_tag ON tagindex(tagid);

-- ----------------------------------------------------------------
-- Index-level properties (ordering kind)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS indexmeta (
    key   TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection, kind: IndexKind) -> Result<(), rusqlite::Error> {
    match kind {
        IndexKind::TimeSeries => conn.execute_batch(MAIN_TIMESERIES_SQL)?,
        IndexKind::Unordered => conn.execute_batch(MAIN_UNORDERED_SQL)?,
    }
    conn.execute_batch(COMMON_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO indexmeta (key, value) VALUES ('kind', ?1)",
        params![kind.as_str()],
    )?;
    Ok(())
}
