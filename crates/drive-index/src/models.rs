//! Domain model structs persisted in the drive index.

use std::fmt;

use drive_shared::{FileId, MemberId, SenderId, TagId, ThreadId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// IndexKind
// ---------------------------------------------------------------------------

/// Ordering semantics of an index, fixed when the index is created.
///
/// * `TimeSeries` - chat, mail, feeds. Rows are clustered and returned by
///   descending file id, i.e. newest first.
/// * `Unordered` - cloud-drive style storage where recency means nothing to
///   the user. Rows are clustered by insertion row number; batch order is
///   stable across calls but not by file age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    TimeSeries,
    Unordered,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::TimeSeries => "timeseries",
            IndexKind::Unordered => "unordered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "timeseries" | "time_series" | "time-series" => Some(IndexKind::TimeSeries),
            "unordered" | "random" => Some(IndexKind::Unordered),
            _ => None,
        }
    }

    /// Column that defines batch-scan order for this kind.
    pub(crate) fn order_column(&self) -> &'static str {
        match self {
            IndexKind::TimeSeries => "fileid",
            IndexKind::Unordered => "rowno",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// MainEntry
// ---------------------------------------------------------------------------

/// One row of the main index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MainEntry {
    pub file_id: FileId,
    /// Unix seconds at insert. Never changes.
    pub created_at: u64,
    /// Zero until the first update, then a unique unix-millisecond stamp
    /// refreshed by every update.
    pub updated_at: u64,
    pub file_type: i32,
    pub data_type: i32,
    pub sender_id: Option<SenderId>,
    pub thread_id: Option<ThreadId>,
    /// Application supplied date, independent of the system timestamps.
    pub user_date: u64,
    pub is_archived: bool,
    pub is_history: bool,
    pub required_security_group: i32,
}

// ---------------------------------------------------------------------------
// NewEntry
// ---------------------------------------------------------------------------

/// Everything `add_entry` needs to create a file's index rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub file_id: FileId,
    pub file_type: i32,
    pub data_type: i32,
    pub sender_id: Option<SenderId>,
    pub thread_id: Option<ThreadId>,
    pub user_date: u64,
    pub required_security_group: i32,
    pub acl: Option<Vec<MemberId>>,
    pub tags: Option<Vec<TagId>>,
}

impl NewEntry {
    /// An entry with zeroed scalars and no ACL or tags.
    pub fn new(file_id: FileId) -> Self {
        Self {
            file_id,
            file_type: 0,
            data_type: 0,
            sender_id: None,
            thread_id: None,
            user_date: 0,
            required_security_group: 0,
            acl: None,
            tags: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Scalar fields to overwrite on an existing main entry. `None` leaves the
/// stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MainPatch {
    pub file_type: Option<i32>,
    pub data_type: Option<i32>,
    pub sender_id: Option<SenderId>,
    pub thread_id: Option<ThreadId>,
    pub user_date: Option<u64>,
    pub is_archived: Option<bool>,
    pub is_history: Option<bool>,
    pub required_security_group: Option<i32>,
}

impl MainPatch {
    pub fn is_empty(&self) -> bool {
        *self == MainPatch::default()
    }
}

/// A full update: scalar patch plus differential ACL / tag changes.
///
/// Deletes are applied before adds, so a member that appears in both sets
/// ends up present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryUpdate {
    pub patch: MainPatch,
    pub acl_add: Vec<MemberId>,
    pub acl_delete: Vec<MemberId>,
    pub tag_add: Vec<TagId>,
    pub tag_delete: Vec<TagId>,
}

impl EntryUpdate {
    pub fn with_patch(patch: MainPatch) -> Self {
        Self {
            patch,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parsing() {
        assert_eq!(IndexKind::parse("TimeSeries"), Some(IndexKind::TimeSeries));
        assert_eq!(IndexKind::parse(" random "), Some(IndexKind::Unordered));
        assert_eq!(IndexKind::parse("sorted"), None);
        for kind in [IndexKind::TimeSeries, IndexKind::Unordered] {
            assert_eq!(IndexKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn main_entry_json_uses_hex_ids() {
        let entry = MainEntry {
            file_id: FileId([0x01; 16]),
            created_at: 1_700_000_000,
            updated_at: 0,
            file_type: 1,
            data_type: 2,
            sender_id: Some(SenderId([0xFF; 16])),
            thread_id: None,
            user_date: 42,
            is_archived: false,
            is_history: true,
            required_security_group: 3,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["file_id"], "01".repeat(16));
        assert_eq!(json["sender_id"], "ff".repeat(16));
        assert!(json["thread_id"].is_null());

        let back: MainEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
        assert_eq!(serde_json::to_string(&IndexKind::Unordered).unwrap(), "\"unordered\"");
    }

    #[test]
    fn empty_patch() {
        assert!(MainPatch::default().is_empty());
        let patch = MainPatch {
            is_archived: Some(false),
            ..MainPatch::default()
        };
        assert!(!patch.is_empty());
        assert!(EntryUpdate::with_patch(patch).acl_add.is_empty());
    }
}
