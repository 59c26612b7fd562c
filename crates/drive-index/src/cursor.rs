//! Stateful cursor for newest-first paging with later catch-up.
//!
//! A client pages backwards through everything with one cursor. When the
//! history is exhausted the newest id seen becomes a boundary, and from then
//! on the same cursor only returns what arrived after it. The cursor
//! serialises to an opaque string so it can live on the client.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use drive_shared::constants::ID_LEN;
use drive_shared::FileId;
use serde::{Deserialize, Serialize};

use crate::database::DriveIndex;
use crate::error::{Result, StoreError};
use crate::query::{QueryBatchResult, QueryFilter};

const SLOT_PAGING: u8 = 0b001;
const SLOT_CURRENT: u8 = 0b010;
const SLOT_NEXT: u8 = 0b100;
const STATE_LEN: usize = 1 + 3 * ID_LEN;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCursor {
    /// Oldest id returned so far in the current pass.
    pub paging: Option<FileId>,
    /// Nothing at or below this id is returned.
    pub current_boundary: Option<FileId>,
    /// Newest id of the current pass; becomes the boundary once the pass
    /// runs dry.
    pub next_boundary: Option<FileId>,
}

impl BatchCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cursor that never returns anything older than `unix_seconds`.
    pub fn stop_at_time(unix_seconds: u64) -> Self {
        Self {
            current_boundary: Some(FileId::lower_bound_at(unix_seconds.saturating_mul(1000))),
            ..Self::default()
        }
    }

    pub fn to_state(&self) -> String {
        let mut bytes = [0u8; STATE_LEN];
        let slots = [
            (SLOT_PAGING, self.paging),
            (SLOT_CURRENT, self.current_boundary),
            (SLOT_NEXT, self.next_boundary),
        ];
        for (i, (flag, slot)) in slots.into_iter().enumerate() {
            if let Some(id) = slot {
                bytes[0] |= flag;
                let at = 1 + i * ID_LEN;
                bytes[at..at + ID_LEN].copy_from_slice(&id.0);
            }
        }
        STANDARD.encode(bytes)
    }

    pub fn from_state(state: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(state.trim())
            .map_err(|e| StoreError::InvalidCursor(e.to_string()))?;
        if bytes.len() != STATE_LEN {
            return Err(StoreError::InvalidCursor(format!(
                "expected {STATE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let flags = bytes[0];
        if flags & !(SLOT_PAGING | SLOT_CURRENT | SLOT_NEXT) != 0 {
            return Err(StoreError::InvalidCursor(format!("unknown flags {flags:#04x}")));
        }

        let slot = |i: usize, flag: u8| -> Option<FileId> {
            if flags & flag == 0 {
                return None;
            }
            let at = 1 + i * ID_LEN;
            let mut id = [0u8; ID_LEN];
            id.copy_from_slice(&bytes[at..at + ID_LEN]);
            Some(FileId(id))
        };

        Ok(Self {
            paging: slot(0, SLOT_PAGING),
            current_boundary: slot(1, SLOT_CURRENT),
            next_boundary: slot(2, SLOT_NEXT),
        })
    }
}

impl DriveIndex {
    /// Next page for `cursor`, advancing it in place.
    ///
    /// A page that runs out of history before `limit` promotes the boundary
    /// and fills the remainder with newer items, which come first. An empty
    /// result means the cursor is caught up; calling again later returns
    /// whatever has been added above the boundary since.
    pub fn query_batch_cursor(
        &self,
        limit: usize,
        cursor: &mut BatchCursor,
        filter: &QueryFilter,
    ) -> Result<QueryBatchResult> {
        let mut page = self.query_batch(
            limit,
            cursor.paging.as_ref(),
            cursor.current_boundary.as_ref(),
            filter,
        )?;

        let (Some(first), Some(last)) = (page.ids.first().copied(), page.ids.last().copied())
        else {
            return match cursor.next_boundary.take() {
                Some(next) => {
                    // The pass is complete; start a catch-up pass above it.
                    cursor.current_boundary = Some(next);
                    cursor.paging = None;
                    self.query_batch_cursor(limit, cursor, filter)
                }
                None => {
                    cursor.paging = None;
                    Ok(page)
                }
            };
        };

        if cursor.paging.is_none() {
            cursor.next_boundary = Some(first);
        }
        cursor.paging = Some(last);
        if page.ids.len() >= limit {
            return Ok(page);
        }

        if let Some(next) = cursor.next_boundary.take() {
            cursor.current_boundary = Some(next);
        }
        cursor.paging = None;
        let mut newer = self.query_batch_cursor(limit - page.ids.len(), cursor, filter)?;
        if !newer.ids.is_empty() {
            page.first_cursor = newer.first_cursor;
            newer.ids.append(&mut page.ids);
            page.ids = newer.ids;
        }
        Ok(page)
    }
}
