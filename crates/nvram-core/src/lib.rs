// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Space-management state machine for the access-controlled NVRAM service.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! Core of the access-controlled NVRAM backend.
//!
//! [`NvramManager`] tracks the allocated spaces and their per-boot state,
//! mediates every request through the access-control evaluator, and keeps the
//! persistent header and space records mutually consistent across arbitrary
//! power-loss points with a two-phase update protocol. Persistence itself is
//! behind the [`persistence::Storage`] trait; wire messages live in
//! `nvram-wire`.

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod access;
pub mod manager;
pub mod persistence;
pub mod table;

pub use manager::NvramManager;

use nvram_wire::NvResult;

/// Maximum number of spaces the backend is willing to allocate.
pub const MAX_SPACES: usize = 32;

/// Maximum size of a single space's contents, in bytes.
pub const MAX_SPACE_SIZE: usize = 1024;

/// Maximum authorization value size, in bytes.
pub const MAX_AUTH_SIZE: usize = 32;

/// Request-level failures, surfaced to clients as non-success result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NvError {
    /// Storage, serialization, or invariant failure inside the backend.
    #[error("internal storage or bookkeeping failure")]
    Internal,
    /// The supplied authorization value did not match the stored one.
    #[error("authorization value mismatch")]
    AuthorizationFailed,
    /// A request parameter was out of range or inconsistent.
    #[error("invalid request parameter")]
    InvalidParameter,
    /// The named space is not allocated.
    #[error("space does not exist")]
    SpaceDoesNotExist,
    /// The named space is already allocated.
    #[error("space already exists")]
    SpaceAlreadyExists,
    /// The operation is locked out for this space or device.
    #[error("operation disabled")]
    OperationDisabled,
}

impl From<NvError> for NvResult {
    fn from(error: NvError) -> Self {
        match error {
            NvError::Internal => NvResult::InternalError,
            NvError::AuthorizationFailed => NvResult::AuthorizationFailed,
            NvError::InvalidParameter => NvResult::InvalidParameter,
            NvError::SpaceDoesNotExist => NvResult::SpaceDoesNotExist,
            NvError::SpaceAlreadyExists => NvResult::SpaceAlreadyExists,
            NvError::OperationDisabled => NvResult::OperationDisabled,
        }
    }
}
