//! Writers: add, update and remove a file's rows across all three tables.
//!
//! Each method is one unit of work under the connection lock (see
//! [`DriveIndex::write`]); on error nothing it wrote survives.

use drive_shared::{time, FileId, MemberId, TagId};

use crate::database::DriveIndex;
use crate::error::Result;
use crate::main_index;
use crate::member_index::{ACL_INDEX, TAG_INDEX};
use crate::models::{EntryUpdate, MainPatch, NewEntry};

impl DriveIndex {
    /// Create the main row plus its ACL and tag rows.
    ///
    /// Fails with [`StoreError::DuplicateKey`] if the id exists or either
    /// list repeats a member.
    ///
    /// [`StoreError::DuplicateKey`]: crate::StoreError::DuplicateKey
    pub fn add_entry(&self, entry: &NewEntry) -> Result<()> {
        self.write(|conn, cache| {
            cache.invalidate(&entry.file_id);
            main_index::insert(conn, entry, time::unix_seconds())?;
            if let Some(acl) = &entry.acl {
                ACL_INDEX.insert_many(conn, &entry.file_id, acl)?;
            }
            if let Some(tags) = &entry.tags {
                TAG_INDEX.insert_many(conn, &entry.file_id, tags)?;
            }
            Ok(())
        })?;

        tracing::trace!(file_id = %entry.file_id, "entry added");
        Ok(())
    }

    /// Patch scalars and apply differential ACL / tag changes.
    ///
    /// Order is patch, ACL deletes, ACL adds, tag deletes, tag adds, and
    /// `updated_at` is refreshed once for the whole update. Fails with
    /// [`StoreError::NotFound`] when there is no main entry, whatever the
    /// update carries.
    ///
    /// [`StoreError::NotFound`]: crate::StoreError::NotFound
    pub fn update_entry(&self, file_id: &FileId, update: &EntryUpdate) -> Result<()> {
        self.write(|conn, cache| {
            cache.invalidate(file_id);
            // Taken under the lock so stamps follow commit order.
            let modified = time::unique_unix_millis();
            main_index::update(conn, file_id, &update.patch, modified)?;

            ACL_INDEX.delete(conn, file_id, &update.acl_delete)?;
            ACL_INDEX.add(conn, file_id, &update.acl_add)?;
            TAG_INDEX.delete(conn, file_id, &update.tag_delete)?;
            TAG_INDEX.add(conn, file_id, &update.tag_add)?;
            Ok(())
        })?;

        tracing::trace!(file_id = %file_id, "entry updated");
        Ok(())
    }

    /// Overwrite the full ACL and tag sets, refreshing `updated_at`.
    pub fn replace_lists(&self, file_id: &FileId, acl: &[MemberId], tags: &[TagId]) -> Result<()> {
        self.write(|conn, cache| {
            cache.invalidate(file_id);
            let modified = time::unique_unix_millis();
            main_index::update(conn, file_id, &MainPatch::default(), modified)?;

            ACL_INDEX.delete_all(conn, file_id)?;
            ACL_INDEX.insert_many(conn, file_id, acl)?;
            TAG_INDEX.delete_all(conn, file_id)?;
            TAG_INDEX.insert_many(conn, file_id, tags)?;
            Ok(())
        })
    }

    /// Refresh `updated_at` without changing anything else, so the entry
    /// shows up in the next delta scan.
    pub fn touch(&self, file_id: &FileId) -> Result<()> {
        self.write(|conn, cache| {
            cache.invalidate(file_id);
            main_index::touch(conn, file_id, time::unique_unix_millis())
        })
    }

    /// Remove a file from all three tables. Returns `false` if there was no
    /// main entry.
    pub fn delete_entry(&self, file_id: &FileId) -> Result<bool> {
        let removed = self.write(|conn, cache| {
            cache.invalidate(file_id);
            ACL_INDEX.delete_all(conn, file_id)?;
            TAG_INDEX.delete_all(conn, file_id)?;
            main_index::delete(conn, file_id)
        })?;

        if removed {
            tracing::trace!(file_id = %file_id, "entry deleted");
        }
        Ok(removed)
    }

    /// Whether a main entry exists for `file_id`.
    pub fn contains(&self, file_id: &FileId) -> Result<bool> {
        self.read(|conn, cache| {
            if cache.get(file_id).is_some() {
                return Ok(true);
            }
            main_index::exists(conn, file_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use drive_shared::SenderId;

    use super::*;
    use crate::error::StoreError;
    use crate::models::IndexKind;

    fn open(kind: IndexKind) -> (tempfile::TempDir, DriveIndex) {
        let dir = tempfile::tempdir().unwrap();
        let index = DriveIndex::open(dir.path().join("drive.db"), kind).unwrap();
        (dir, index)
    }

    fn members(n: usize) -> Vec<MemberId> {
        let mut v: Vec<MemberId> = (0..n).map(|_| MemberId::random()).collect();
        v.sort();
        v
    }

    #[test]
    fn add_entry_writes_all_tables() {
        let (_dir, index) = open(IndexKind::TimeSeries);
        let mut entry = NewEntry::new(FileId::new());
        entry.file_type = 4;
        entry.sender_id = Some(SenderId::random());
        entry.acl = Some(members(3));
        entry.tags = Some(vec![TagId::random()]);

        let before = time::unix_seconds();
        index.add_entry(&entry).unwrap();

        let main = index.get_main(&entry.file_id).unwrap().unwrap();
        assert_eq!(main.file_type, 4);
        assert_eq!(main.updated_at, 0);
        assert!(main.created_at >= before);
        assert_eq!(index.get_acl(&entry.file_id).unwrap(), entry.acl.clone().unwrap());
        assert_eq!(index.get_tags(&entry.file_id).unwrap(), entry.tags.clone().unwrap());
    }

    #[test]
    fn add_entry_is_all_or_nothing() {
        let (_dir, index) = open(IndexKind::Unordered);
        let dup = MemberId::random();
        let mut entry = NewEntry::new(FileId::new());
        entry.acl = Some(vec![dup, MemberId::random(), dup]);

        let err = index.add_entry(&entry).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { table: "aclindex", .. }));
        assert!(index.get_main(&entry.file_id).unwrap().is_none());
        assert!(index.get_acl(&entry.file_id).unwrap().is_empty());
        assert_eq!(index.count().unwrap(), 0);
    }

    #[test]
    fn add_existing_id_fails() {
        let (_dir, index) = open(IndexKind::TimeSeries);
        let mut entry = NewEntry::new(FileId::new());
        entry.tags = Some(vec![TagId::random()]);
        index.add_entry(&entry).unwrap();

        let err = index.add_entry(&entry).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { table: "mainindex", .. }));
        assert_eq!(index.get_tags(&entry.file_id).unwrap().len(), 1);
    }

    #[test]
    fn acl_round_trip_through_updates() {
        let (_dir, index) = open(IndexKind::TimeSeries);
        let abcd = members(4);
        let e = MemberId::random();
        let mut entry = NewEntry::new(FileId::new());
        entry.acl = Some(abcd.clone());
        index.add_entry(&entry).unwrap();

        index
            .update_entry(
                &entry.file_id,
                &EntryUpdate {
                    acl_delete: abcd.clone(),
                    acl_add: vec![e],
                    ..EntryUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(index.get_acl(&entry.file_id).unwrap(), vec![e]);

        index
            .update_entry(
                &entry.file_id,
                &EntryUpdate {
                    acl_delete: vec![e],
                    acl_add: abcd.clone(),
                    ..EntryUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(index.get_acl(&entry.file_id).unwrap(), abcd);
    }

    #[test]
    fn delete_then_add_same_member_keeps_it() {
        let (_dir, index) = open(IndexKind::TimeSeries);
        let tag = TagId::random();
        let mut entry = NewEntry::new(FileId::new());
        entry.tags = Some(vec![tag]);
        index.add_entry(&entry).unwrap();

        index
            .update_entry(
                &entry.file_id,
                &EntryUpdate {
                    tag_delete: vec![tag],
                    tag_add: vec![tag],
                    ..EntryUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(index.get_tags(&entry.file_id).unwrap(), vec![tag]);
    }

    #[test]
    fn update_refreshes_stamp_and_cache() {
        let (_dir, index) = open(IndexKind::TimeSeries);
        let entry = NewEntry::new(FileId::new());
        index.add_entry(&entry).unwrap();
        assert_eq!(index.get_main(&entry.file_id).unwrap().unwrap().updated_at, 0);

        let before = index.current_timestamp();
        index
            .update_entry(
                &entry.file_id,
                &EntryUpdate::with_patch(MainPatch {
                    is_history: Some(true),
                    ..MainPatch::default()
                }),
            )
            .unwrap();
        let after = index.current_timestamp();

        let main = index.get_main(&entry.file_id).unwrap().unwrap();
        assert!(main.is_history);
        assert!(main.updated_at > before && main.updated_at < after);

        index.touch(&entry.file_id).unwrap();
        let touched = index.get_main(&entry.file_id).unwrap().unwrap();
        assert!(touched.updated_at > main.updated_at);
    }

    #[test]
    fn update_missing_entry_is_not_found() {
        let (_dir, index) = open(IndexKind::Unordered);
        let id = FileId::new();
        let update = EntryUpdate {
            tag_add: vec![TagId::random()],
            ..EntryUpdate::default()
        };
        let err = index.update_entry(&id, &update).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
        assert!(index.get_tags(&id).unwrap().is_empty());
    }

    #[test]
    fn failed_update_rolls_back_patch() {
        let (_dir, index) = open(IndexKind::TimeSeries);
        let a = MemberId::random();
        let mut entry = NewEntry::new(FileId::new());
        entry.acl = Some(vec![a]);
        index.add_entry(&entry).unwrap();

        let update = EntryUpdate {
            patch: MainPatch {
                file_type: Some(99),
                ..MainPatch::default()
            },
            acl_add: vec![a],
            ..EntryUpdate::default()
        };
        let err = index.update_entry(&entry.file_id, &update).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));

        let main = index.get_main(&entry.file_id).unwrap().unwrap();
        assert_eq!(main.file_type, 0);
        assert_eq!(main.updated_at, 0);
    }

    #[test]
    fn replace_and_delete() {
        let (_dir, index) = open(IndexKind::Unordered);
        let mut entry = NewEntry::new(FileId::new());
        entry.acl = Some(members(2));
        entry.tags = Some(vec![TagId::random()]);
        index.add_entry(&entry).unwrap();

        let acl = members(3);
        index.replace_lists(&entry.file_id, &acl, &[]).unwrap();
        assert_eq!(index.get_acl(&entry.file_id).unwrap(), acl);
        assert!(index.get_tags(&entry.file_id).unwrap().is_empty());
        assert!(index.get_main(&entry.file_id).unwrap().unwrap().updated_at > 0);

        assert!(index.contains(&entry.file_id).unwrap());
        assert!(index.delete_entry(&entry.file_id).unwrap());
        assert!(!index.delete_entry(&entry.file_id).unwrap());
        assert!(!index.contains(&entry.file_id).unwrap());
        assert!(index.get_acl(&entry.file_id).unwrap().is_empty());
    }

    #[test]
    fn batched_writes_commit_together() {
        let (_dir, index) = open(IndexKind::TimeSeries);
        index.begin_batch().unwrap();
        let ids: Vec<FileId> = (0..10).map(|_| FileId::new()).collect();
        for id in &ids {
            index.add_entry(&NewEntry::new(*id)).unwrap();
        }
        // A failing call inside the batch only rolls back itself.
        assert!(index.add_entry(&NewEntry::new(ids[0])).is_err());
        index.commit().unwrap();
        assert_eq!(index.count().unwrap(), 10);

        index.begin_batch().unwrap();
        index.add_entry(&NewEntry::new(FileId::new())).unwrap();
        index.rollback().unwrap();
        assert_eq!(index.count().unwrap(), 10);
    }
}
