// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: NVRAM space manager: recovery, command handlers, and dispatch.
// Author: Lukas Bower

//! The NVRAM space manager.
//!
//! Tracks allocated spaces and their per-boot state, and serves the full
//! command set. Mutations follow a two-phase protocol keyed off the header's
//! provisional index: the header is written before the space blob on create
//! and before the blob deletion on delete, so the set of spaces named by the
//! header is always a superset of the space blobs in storage. Recovery runs
//! lazily on the first request and repairs any half-finished mutation.

use alloc::vec;
use alloc::vec::Vec;

use log::{error, info, warn};
use nvram_wire::{NvControl, Request, Response, ResponseEnvelope};
use sha2::{Digest, Sha256};

use crate::access::SpaceRecord;
use crate::persistence::{self, NvramHeader, NvramSpace, Storage, StorageError};
use crate::table::SpaceTable;
use crate::{NvError, MAX_AUTH_SIZE, MAX_SPACES, MAX_SPACE_SIZE};

/// Bitmask of all control positions the backend understands.
const SUPPORTED_CONTROLS_MASK: u32 = NvControl::PersistentWriteLock.mask()
    | NvControl::BootWriteLock.mask()
    | NvControl::BootReadLock.mask()
    | NvControl::WriteAuthorization.mask()
    | NvControl::ReadAuthorization.mask()
    | NvControl::WriteExtend.mask();

/// Core state machine of the access-controlled NVRAM backend.
///
/// One request is processed at a time; the manager is not reentrant and the
/// caller must serialize request delivery.
#[derive(Debug)]
pub struct NvramManager<S> {
    storage: S,
    table: SpaceTable,
    initialized: bool,
    create_disabled: bool,
}

impl<S: Storage> NvramManager<S> {
    /// Create a manager over the supplied storage. Recovery runs lazily on
    /// the first request.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            table: SpaceTable::new(),
            initialized: false,
            create_disabled: false,
        }
    }

    /// Route a decoded request to the matching operation handler and package
    /// the outcome as a response envelope.
    pub fn dispatch(&mut self, request: &Request) -> ResponseEnvelope {
        let command = request.command();
        let outcome = match request {
            Request::GetInfo => self.get_info(),
            Request::CreateSpace {
                index,
                size,
                controls,
                authorization_value,
            } => self.create_space(*index, *size, controls, authorization_value),
            Request::GetSpaceInfo { index } => self.get_space_info(*index),
            Request::DeleteSpace {
                index,
                authorization_value,
            } => self.delete_space(*index, authorization_value),
            Request::DisableCreate => self.disable_create(),
            Request::WriteSpace {
                index,
                buffer,
                authorization_value,
            } => self.write_space(*index, buffer, authorization_value),
            Request::ReadSpace {
                index,
                authorization_value,
            } => self.read_space(*index, authorization_value),
            Request::LockSpaceWrite {
                index,
                authorization_value,
            } => self.lock_space_write(*index, authorization_value),
            Request::LockSpaceRead {
                index,
                authorization_value,
            } => self.lock_space_read(*index, authorization_value),
        };
        match outcome {
            Ok(body) => ResponseEnvelope::success(body),
            Err(err) => ResponseEnvelope::failure(command, err.into()),
        }
    }

    /// Report device geometry and the allocated space list.
    pub fn get_info(&mut self) -> Result<Response, NvError> {
        info!("[nvram] get info");
        self.ensure_initialized()?;

        Ok(Response::GetInfo {
            total_size: (MAX_SPACES * MAX_SPACE_SIZE) as u64,
            available_size: ((MAX_SPACES - self.table.len()) * MAX_SPACE_SIZE) as u64,
            max_spaces: MAX_SPACES as u32,
            space_list: self.table.indices().collect(),
        })
    }

    /// Allocate a new space.
    pub fn create_space(
        &mut self,
        index: u32,
        size: u64,
        controls_list: &[u32],
        authorization_value: &[u8],
    ) -> Result<Response, NvError> {
        info!("[nvram] create space 0x{index:x}");
        self.ensure_initialized()?;

        if self.create_disabled {
            info!("[nvram] space creation is disabled");
            return Err(NvError::OperationDisabled);
        }
        if self.table.find(index).is_some() {
            info!("[nvram] space 0x{index:x} already exists");
            return Err(NvError::SpaceAlreadyExists);
        }
        if self.table.len() + 1 > MAX_SPACES {
            info!("[nvram] too many spaces");
            return Err(NvError::InvalidParameter);
        }
        if size > MAX_SPACE_SIZE as u64 {
            info!("[nvram] requested size {size} exceeds the space size limit");
            return Err(NvError::InvalidParameter);
        }
        if authorization_value.len() > MAX_AUTH_SIZE {
            info!("[nvram] authorization blob too large");
            return Err(NvError::InvalidParameter);
        }
        let mut controls = 0u32;
        for &control in controls_list {
            if control >= u32::BITS {
                info!("[nvram] unsupported control {control}");
                return Err(NvError::InvalidParameter);
            }
            controls |= 1 << control;
        }
        if controls & !SUPPORTED_CONTROLS_MASK != 0 {
            info!("[nvram] unsupported controls requested");
            return Err(NvError::InvalidParameter);
        }
        if controls & NvControl::PersistentWriteLock.mask() != 0
            && controls & NvControl::BootWriteLock.mask() != 0
        {
            info!("[nvram] write lock controls are mutually exclusive");
            return Err(NvError::InvalidParameter);
        }

        let mut space = NvramSpace {
            flags: 0,
            controls,
            authorization_value: Vec::new(),
            contents: vec![0u8; size as usize],
        };
        if space.has_control(NvControl::WriteAuthorization)
            || space.has_control(NvControl::ReadAuthorization)
        {
            space.authorization_value = authorization_value.to_vec();
        }

        // Tentatively mark the index allocated so the header write sees it.
        let position = self.table.len();
        if self.table.append(index).is_err() {
            return Err(NvError::Internal);
        }

        // Header before space data: the header must always name a superset
        // of the space blobs in storage. A crash between the two writes
        // leaves the index marked provisional and recovery drops it.
        let committed = self.write_header(Some(index)).and_then(|()| {
            persistence::store_space(&mut self.storage, index, &space).map_err(|err| {
                error!("[nvram] failed to store space 0x{index:x}: {err}");
                NvError::Internal
            })
        });
        if let Err(err) = committed {
            self.table.remove(position);
            return Err(err);
        }
        Ok(Response::CreateSpace)
    }

    /// Report the parameters and current lock state of one space.
    pub fn get_space_info(&mut self, index: u32) -> Result<Response, NvError> {
        info!("[nvram] get space info 0x{index:x}");
        self.ensure_initialized()?;

        let record = SpaceRecord::load(&mut self.table, &mut self.storage, index)?;
        let persistent = &record.persistent;

        let mut controls = Vec::new();
        for bit in 0..u32::BITS {
            if persistent.controls & (1 << bit) != 0 {
                controls.push(bit);
            }
        }

        let read_locked =
            persistent.has_control(NvControl::BootReadLock) && record.transient.read_locked;
        let write_locked = if persistent.has_control(NvControl::PersistentWriteLock) {
            persistent.has_flag(NvramSpace::FLAG_WRITE_LOCKED)
        } else if persistent.has_control(NvControl::BootWriteLock) {
            record.transient.write_locked
        } else {
            false
        };

        Ok(Response::GetSpaceInfo {
            size: persistent.contents.len() as u64,
            controls,
            read_locked,
            write_locked,
        })
    }

    /// Deallocate a space.
    pub fn delete_space(
        &mut self,
        index: u32,
        authorization_value: &[u8],
    ) -> Result<Response, NvError> {
        info!("[nvram] delete space 0x{index:x}");
        self.ensure_initialized()?;

        {
            let record = SpaceRecord::load(&mut self.table, &mut self.storage, index)?;
            record.check_delete_access(authorization_value)?;
        }

        // Commit the intent first: the header keeps naming the index but
        // marks it provisional, so after a crash the missing blob reads as a
        // completed deletion.
        self.write_header(Some(index))?;
        match persistence::delete_space(&mut self.storage, index) {
            Ok(()) | Err(StorageError::NotFound) => {}
            Err(err) => {
                error!("[nvram] failed to delete space 0x{index:x}: {err}");
                return Err(NvError::Internal);
            }
        }
        if let Some(position) = self.table.find(index) {
            self.table.remove(position);
        }
        self.write_header(None)?;
        Ok(Response::DeleteSpace)
    }

    /// Permanently disable creation of further spaces.
    pub fn disable_create(&mut self) -> Result<Response, NvError> {
        info!("[nvram] disable create");
        self.ensure_initialized()?;

        // Latch in memory, then persist so the flag survives reboots.
        self.create_disabled = true;
        self.write_header(None)?;
        Ok(Response::DisableCreate)
    }

    /// Replace or extend the contents of a space.
    pub fn write_space(
        &mut self,
        index: u32,
        buffer: &[u8],
        authorization_value: &[u8],
    ) -> Result<Response, NvError> {
        info!("[nvram] write space 0x{index:x}");
        self.ensure_initialized()?;

        let record = SpaceRecord::load(&mut self.table, &mut self.storage, index)?;
        record.check_write_access(authorization_value)?;

        let SpaceRecord { mut persistent, .. } = record;
        let size = persistent.contents.len();
        if persistent.has_control(NvControl::WriteExtend) {
            // contents := SHA256(old || input), fitted to the space size.
            let mut hasher = Sha256::new();
            hasher.update(&persistent.contents);
            hasher.update(buffer);
            let digest = hasher.finalize();
            let mut contents = vec![0u8; size];
            let prefix = size.min(digest.len());
            contents[..prefix].copy_from_slice(&digest[..prefix]);
            persistent.contents = contents;
        } else {
            if buffer.len() > size {
                info!(
                    "[nvram] write of {} bytes exceeds space size {size}",
                    buffer.len()
                );
                return Err(NvError::InvalidParameter);
            }
            let mut contents = vec![0u8; size];
            contents[..buffer.len()].copy_from_slice(buffer);
            persistent.contents = contents;
        }

        persistence::store_space(&mut self.storage, index, &persistent).map_err(|err| {
            error!("[nvram] failed to store space 0x{index:x}: {err}");
            NvError::Internal
        })?;
        Ok(Response::WriteSpace)
    }

    /// Read back the full contents of a space.
    pub fn read_space(
        &mut self,
        index: u32,
        authorization_value: &[u8],
    ) -> Result<Response, NvError> {
        info!("[nvram] read space 0x{index:x}");
        self.ensure_initialized()?;

        let record = SpaceRecord::load(&mut self.table, &mut self.storage, index)?;
        record.check_read_access(authorization_value)?;
        let SpaceRecord { persistent, .. } = record;
        Ok(Response::ReadSpace {
            buffer: persistent.contents,
        })
    }

    /// Lock a space against writes, persistently or for the rest of the boot
    /// depending on its controls.
    pub fn lock_space_write(
        &mut self,
        index: u32,
        authorization_value: &[u8],
    ) -> Result<Response, NvError> {
        info!("[nvram] lock space write 0x{index:x}");
        self.ensure_initialized()?;

        let record = SpaceRecord::load(&mut self.table, &mut self.storage, index)?;
        record.check_write_access(authorization_value)?;

        if record.persistent.has_control(NvControl::PersistentWriteLock) {
            let SpaceRecord { mut persistent, .. } = record;
            persistent.set_flag(NvramSpace::FLAG_WRITE_LOCKED);
            persistence::store_space(&mut self.storage, index, &persistent).map_err(|err| {
                error!("[nvram] failed to store space 0x{index:x}: {err}");
                NvError::Internal
            })?;
            Ok(Response::LockSpaceWrite)
        } else if record.persistent.has_control(NvControl::BootWriteLock) {
            record.transient.write_locked = true;
            Ok(Response::LockSpaceWrite)
        } else {
            info!("[nvram] space 0x{index:x} has no write lock control");
            Err(NvError::InvalidParameter)
        }
    }

    /// Lock a space against reads for the rest of the boot.
    pub fn lock_space_read(
        &mut self,
        index: u32,
        authorization_value: &[u8],
    ) -> Result<Response, NvError> {
        info!("[nvram] lock space read 0x{index:x}");
        self.ensure_initialized()?;

        let record = SpaceRecord::load(&mut self.table, &mut self.storage, index)?;
        record.check_read_access(authorization_value)?;

        if record.persistent.has_control(NvControl::BootReadLock) {
            record.transient.read_locked = true;
            Ok(Response::LockSpaceRead)
        } else {
            info!("[nvram] space 0x{index:x} has no read lock control");
            Err(NvError::InvalidParameter)
        }
    }

    fn ensure_initialized(&mut self) -> Result<(), NvError> {
        if self.initialize() {
            Ok(())
        } else {
            Err(NvError::Internal)
        }
    }

    /// Reconcile in-memory state with storage, repairing any half-finished
    /// mutation. Idempotent on success; retried on the next request after a
    /// failure.
    fn initialize(&mut self) -> bool {
        if self.initialized {
            return true;
        }

        let header = match persistence::load_header(&mut self.storage) {
            Err(StorageError::NotFound) => {
                // Fresh device; the first mutating operation writes the
                // initial header.
                self.initialized = true;
                return true;
            }
            Err(err) => {
                error!("[nvram] init failed to load header: {err}");
                return false;
            }
            Ok(header) => header,
        };

        if header.version > NvramHeader::VERSION {
            error!(
                "[nvram] storage format {} is newer than {}, refusing",
                header.version,
                NvramHeader::VERSION
            );
            return false;
        }

        // Probe the provisional space if the header names one.
        let provisional_index = header.provisional_index;
        let mut provisional_in_storage = false;
        if let Some(index) = provisional_index {
            match persistence::load_space(&mut self.storage, index) {
                Ok(_) => provisional_in_storage = true,
                Err(StorageError::NotFound) => {}
                Err(err) => {
                    // Keep the index allocated: failing noisily on later
                    // requests beats letting a transient storage error make
                    // the space appear free for clobbering.
                    error!("[nvram] failed to load provisional space 0x{index:x}: {err}");
                    provisional_in_storage = true;
                }
            }
        }

        if header.allocated_indices.len() > MAX_SPACES {
            // Refuse to serve a subset; a client could delete one space and
            // then "create" an index that still has data in storage.
            error!(
                "[nvram] header names {} spaces, limit is {MAX_SPACES}",
                header.allocated_indices.len()
            );
            return false;
        }

        self.table.clear();
        for &index in &header.allocated_indices {
            if provisional_index == Some(index) && !provisional_in_storage {
                // The create never completed; pretend it never happened.
                continue;
            }
            if self.table.append(index).is_err() {
                error!("[nvram] space table overflow during recovery");
                return false;
            }
        }

        // A provisional blob not named in the allocated list is a
        // half-deleted space; destroy it now.
        if let Some(index) = provisional_index {
            if provisional_in_storage && !header.allocated_indices.contains(&index) {
                if let Err(err) = persistence::delete_space(&mut self.storage, index) {
                    error!("[nvram] failed to delete provisional space 0x{index:x}: {err}");
                    return false;
                }
            }
        }

        self.create_disabled = header.has_flag(NvramHeader::FLAG_DISABLE_CREATE);
        self.initialized = true;

        // Clear the provisional index opportunistically. Consistency holds
        // either way; this only avoids re-probing the space on every boot.
        if provisional_index.is_some() {
            if let Err(err) = self.write_header(None) {
                warn!("[nvram] failed to clear provisional index: {err}");
            }
        }

        true
    }

    /// Serialize the current allocated set and flags into a fresh header and
    /// commit it to storage.
    fn write_header(&mut self, provisional_index: Option<u32>) -> Result<(), NvError> {
        let mut header = NvramHeader {
            version: NvramHeader::VERSION,
            flags: 0,
            allocated_indices: self.table.indices().collect(),
            provisional_index,
        };
        if self.create_disabled {
            header.set_flag(NvramHeader::FLAG_DISABLE_CREATE);
        }
        persistence::store_header(&mut self.storage, &header).map_err(|err| {
            error!("[nvram] failed to store header: {err}");
            NvError::Internal
        })
    }
}
