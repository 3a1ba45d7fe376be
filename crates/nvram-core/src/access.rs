// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Per-request space view and access-control evaluation.
// Author: Lukas Bower

//! Access-control evaluator for loaded spaces.

use log::error;
use nvram_wire::NvControl;
use subtle::ConstantTimeEq;

use crate::persistence::{self, NvramSpace, Storage, StorageError};
use crate::table::{SpaceListEntry, SpaceTable};
use crate::NvError;

/// Per-request view of one space: table position, borrowed transient entry,
/// and a private owned copy of the persistent record.
#[derive(Debug)]
pub struct SpaceRecord<'a> {
    /// Position of the space within the table.
    pub array_index: usize,
    /// The per-boot lock state of the space.
    pub transient: &'a mut SpaceListEntry,
    /// The persistent record loaded from storage.
    pub persistent: NvramSpace,
}

impl<'a> SpaceRecord<'a> {
    /// Look up `index` in the table and load its persistent record.
    ///
    /// A space named by the table but missing from storage is an invariant
    /// violation and maps to [`NvError::Internal`].
    pub fn load(
        table: &'a mut SpaceTable,
        storage: &mut dyn Storage,
        index: u32,
    ) -> Result<Self, NvError> {
        let array_index = table.find(index).ok_or(NvError::SpaceDoesNotExist)?;
        let persistent = match persistence::load_space(storage, index) {
            Ok(space) => space,
            Err(StorageError::NotFound) => {
                error!("[nvram] space 0x{index:x} named in header but data missing");
                return Err(NvError::Internal);
            }
            Err(err) => {
                error!("[nvram] failed to load space 0x{index:x}: {err}");
                return Err(NvError::Internal);
            }
        };
        Ok(Self {
            array_index,
            transient: table.entry_mut(array_index),
            persistent,
        })
    }

    /// Evaluate write access for the supplied authorization value.
    pub fn check_write_access(&self, authorization_value: &[u8]) -> Result<(), NvError> {
        if self.persistent.has_control(NvControl::PersistentWriteLock)
            && self.persistent.has_flag(NvramSpace::FLAG_WRITE_LOCKED)
        {
            return Err(NvError::OperationDisabled);
        }
        if self.persistent.has_control(NvControl::BootWriteLock) && self.transient.write_locked {
            return Err(NvError::OperationDisabled);
        }
        if self.persistent.has_control(NvControl::WriteAuthorization)
            && !authorization_matches(&self.persistent.authorization_value, authorization_value)
        {
            return Err(NvError::AuthorizationFailed);
        }
        Ok(())
    }

    /// Evaluate read access for the supplied authorization value.
    pub fn check_read_access(&self, authorization_value: &[u8]) -> Result<(), NvError> {
        if self.persistent.has_control(NvControl::BootReadLock) && self.transient.read_locked {
            return Err(NvError::OperationDisabled);
        }
        if self.persistent.has_control(NvControl::ReadAuthorization)
            && !authorization_matches(&self.persistent.authorization_value, authorization_value)
        {
            return Err(NvError::AuthorizationFailed);
        }
        Ok(())
    }

    /// Evaluate delete access for the supplied authorization value.
    ///
    /// Deletion is a create-side operation: only the write authorization
    /// applies, write locks do not prevent it.
    pub fn check_delete_access(&self, authorization_value: &[u8]) -> Result<(), NvError> {
        if self.persistent.has_control(NvControl::WriteAuthorization)
            && !authorization_matches(&self.persistent.authorization_value, authorization_value)
        {
            return Err(NvError::AuthorizationFailed);
        }
        Ok(())
    }
}

/// Length-equal, constant-time comparison of authorization values.
fn authorization_matches(stored: &[u8], provided: &[u8]) -> bool {
    stored.ct_eq(provided).into()
}
