//! Diffing of active-connection snapshots.
//!
//! Entries are matched by [`entry_id`](ConnectionSnapshotEntry::entry_id)
//! only; handles are reused by the native layer and names are not unique
//! across phone books.

use crate::api::models::ConnectionSnapshotEntry;

/// First entry of `current` with no counterpart in `previous`.
pub(crate) fn find_added<'a>(
    previous: &[ConnectionSnapshotEntry],
    current: &'a [ConnectionSnapshotEntry],
) -> Option<&'a ConnectionSnapshotEntry> {
    current
        .iter()
        .find(|c| !previous.iter().any(|p| p.entry_id == c.entry_id))
}

/// First entry of `previous` with no counterpart in `current`.
pub(crate) fn find_removed<'a>(
    previous: &'a [ConnectionSnapshotEntry],
    current: &[ConnectionSnapshotEntry],
) -> Option<&'a ConnectionSnapshotEntry> {
    find_added(current, previous)
}
