// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Fixed-capacity bookkeeping table for allocated NVRAM spaces.
// Author: Lukas Bower

//! Transient per-boot bookkeeping of allocated spaces.

use heapless::Vec as BoundedVec;

use crate::MAX_SPACES;

/// The space table is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("space table is full")]
pub struct TableFull;

/// Per-boot state of one allocated space. Lock bits reset on every boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceListEntry {
    /// Index of the allocated space.
    pub index: u32,
    /// Writes are locked out until the next boot.
    pub write_locked: bool,
    /// Reads are locked out until the next boot.
    pub read_locked: bool,
}

impl SpaceListEntry {
    fn new(index: u32) -> Self {
        Self {
            index,
            write_locked: false,
            read_locked: false,
        }
    }
}

/// Fixed-capacity table of allocated spaces.
///
/// Backed by a stack-allocated array plus count; the memory footprint never
/// grows past [`MAX_SPACES`] entries. Removal shifts so that the stored
/// header's index order stays append-ordered and deterministic.
#[derive(Debug, Default)]
pub struct SpaceTable {
    entries: BoundedVec<SpaceListEntry, MAX_SPACES>,
}

impl SpaceTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BoundedVec::new(),
        }
    }

    /// Number of allocated spaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Return true when no spaces are allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the position of `index` via linear scan.
    #[must_use]
    pub fn find(&self, index: u32) -> Option<usize> {
        self.entries.iter().position(|entry| entry.index == index)
    }

    /// Append a fresh entry for `index` with all locks clear.
    pub fn append(&mut self, index: u32) -> Result<(), TableFull> {
        self.entries
            .push(SpaceListEntry::new(index))
            .map_err(|_| TableFull)
    }

    /// Remove the entry at `position`, shifting later entries down.
    ///
    /// `position` must come from [`SpaceTable::find`].
    pub fn remove(&mut self, position: usize) -> SpaceListEntry {
        self.entries.remove(position)
    }

    /// Borrow the entry at `position` mutably.
    pub fn entry_mut(&mut self, position: usize) -> &mut SpaceListEntry {
        &mut self.entries[position]
    }

    /// Iterate over the allocated indices in stored order.
    pub fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|entry| entry.index)
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::*;

    #[test]
    fn append_find_remove() {
        let mut table = SpaceTable::new();
        assert!(table.is_empty());
        table.append(3).expect("append");
        table.append(1).expect("append");
        table.append(9).expect("append");
        assert_eq!(table.len(), 3);
        assert_eq!(table.find(1), Some(1));
        assert_eq!(table.find(4), None);

        let removed = table.remove(1);
        assert_eq!(removed.index, 1);
        assert_eq!(table.indices().collect::<Vec<_>>(), [3, 9]);
        assert_eq!(table.find(9), Some(1));
    }

    #[test]
    fn capacity_is_bounded() {
        let mut table = SpaceTable::new();
        for index in 0..MAX_SPACES as u32 {
            table.append(index).expect("append within capacity");
        }
        assert_eq!(table.append(99), Err(TableFull));
        assert_eq!(table.len(), MAX_SPACES);
    }

    #[test]
    fn entries_start_unlocked() {
        let mut table = SpaceTable::new();
        table.append(5).expect("append");
        let entry = table.entry_mut(0);
        assert!(!entry.write_locked);
        assert!(!entry.read_locked);
        entry.write_locked = true;
        assert!(table.entry_mut(0).write_locked);
    }
}
