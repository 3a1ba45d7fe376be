// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Define NVRAM wire types and constants shared across components.
// Author: Lukas Bower

//! NVRAM service data model shared between clients and the backend.

use core::fmt;

use alloc::vec::Vec;

/// Command opcodes understood by the NVRAM backend.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Query device geometry and the allocated space list.
    GetInfo = 1,
    /// Allocate a new space.
    CreateSpace = 2,
    /// Query the parameters and lock state of one space.
    GetSpaceInfo = 3,
    /// Deallocate a space.
    DeleteSpace = 4,
    /// Permanently disable further space creation.
    DisableCreate = 5,
    /// Replace or extend the contents of a space.
    WriteSpace = 6,
    /// Read back the full contents of a space.
    ReadSpace = 7,
    /// Lock a space against writes.
    LockSpaceWrite = 8,
    /// Lock a space against reads for the rest of the boot.
    LockSpaceRead = 9,
}

impl TryFrom<u8> for Command {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use Command::*;
        Ok(match value {
            1 => GetInfo,
            2 => CreateSpace,
            3 => GetSpaceInfo,
            4 => DeleteSpace,
            5 => DisableCreate,
            6 => WriteSpace,
            7 => ReadSpace,
            8 => LockSpaceWrite,
            9 => LockSpaceRead,
            other => return Err(CodecError::UnsupportedCommand(other)),
        })
    }
}

/// Access-control settings attachable to a space at creation time.
///
/// The enum value is the bit position within the persistent `controls`
/// bitmask. Requests carry raw `u32` values so that unknown positions reach
/// the backend and are rejected there rather than at decode time.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvControl {
    /// Writes can be locked out permanently.
    PersistentWriteLock = 0,
    /// Writes can be locked out until the next boot.
    BootWriteLock = 1,
    /// Reads can be locked out until the next boot.
    BootReadLock = 2,
    /// Writes require the authorization value.
    WriteAuthorization = 3,
    /// Reads require the authorization value.
    ReadAuthorization = 4,
    /// Writes extend the contents with a digest instead of replacing them.
    WriteExtend = 5,
}

impl NvControl {
    /// Bitmask corresponding to this control within a `controls` word.
    #[must_use]
    pub const fn mask(self) -> u32 {
        1 << (self as u32)
    }

    /// Resolve a raw bit position to a known control, if any.
    #[must_use]
    pub fn from_bit(value: u32) -> Option<Self> {
        use NvControl::*;
        Some(match value {
            0 => PersistentWriteLock,
            1 => BootWriteLock,
            2 => BootReadLock,
            3 => WriteAuthorization,
            4 => ReadAuthorization,
            5 => WriteExtend,
            _ => return None,
        })
    }
}

/// Result codes returned with every response.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvResult {
    /// The operation completed.
    Success = 0,
    /// Storage, serialization, or invariant failure inside the backend.
    InternalError = 1,
    /// The supplied authorization value did not match.
    AuthorizationFailed = 2,
    /// A request parameter was out of range or inconsistent.
    InvalidParameter = 3,
    /// The named space is not allocated.
    SpaceDoesNotExist = 4,
    /// The named space is already allocated.
    SpaceAlreadyExists = 5,
    /// The operation is locked out for this space or device.
    OperationDisabled = 6,
}

impl NvResult {
    /// Decode a wire result code.
    pub fn from_wire(value: u32) -> Result<Self, CodecError> {
        use NvResult::*;
        Ok(match value {
            0 => Success,
            1 => InternalError,
            2 => AuthorizationFailed,
            3 => InvalidParameter,
            4 => SpaceDoesNotExist,
            5 => SpaceAlreadyExists,
            6 => OperationDisabled,
            other => return Err(CodecError::UnsupportedResult(other)),
        })
    }
}

impl fmt::Display for NvResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "success",
            Self::InternalError => "internal error",
            Self::AuthorizationFailed => "authorization failed",
            Self::InvalidParameter => "invalid parameter",
            Self::SpaceDoesNotExist => "space does not exist",
            Self::SpaceAlreadyExists => "space already exists",
            Self::OperationDisabled => "operation disabled",
        };
        write!(f, "{label}")
    }
}

/// Client request, one variant per command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Query device geometry and the allocated space list.
    GetInfo,
    /// Allocate a new space.
    CreateSpace {
        /// Index of the space to allocate.
        index: u32,
        /// Content size in bytes.
        size: u64,
        /// Raw control values to attach (bit positions).
        controls: Vec<u32>,
        /// Authorization secret, meaningful when an auth control is present.
        authorization_value: Vec<u8>,
    },
    /// Query the parameters and lock state of one space.
    GetSpaceInfo {
        /// Index of the space to inspect.
        index: u32,
    },
    /// Deallocate a space.
    DeleteSpace {
        /// Index of the space to delete.
        index: u32,
        /// Authorization secret.
        authorization_value: Vec<u8>,
    },
    /// Permanently disable further space creation.
    DisableCreate,
    /// Replace or extend the contents of a space.
    WriteSpace {
        /// Index of the space to write.
        index: u32,
        /// Input bytes.
        buffer: Vec<u8>,
        /// Authorization secret.
        authorization_value: Vec<u8>,
    },
    /// Read back the full contents of a space.
    ReadSpace {
        /// Index of the space to read.
        index: u32,
        /// Authorization secret.
        authorization_value: Vec<u8>,
    },
    /// Lock a space against writes.
    LockSpaceWrite {
        /// Index of the space to lock.
        index: u32,
        /// Authorization secret.
        authorization_value: Vec<u8>,
    },
    /// Lock a space against reads for the rest of the boot.
    LockSpaceRead {
        /// Index of the space to lock.
        index: u32,
        /// Authorization secret.
        authorization_value: Vec<u8>,
    },
}

impl Request {
    /// Return the command opcode for this request.
    #[must_use]
    pub fn command(&self) -> Command {
        match self {
            Self::GetInfo => Command::GetInfo,
            Self::CreateSpace { .. } => Command::CreateSpace,
            Self::GetSpaceInfo { .. } => Command::GetSpaceInfo,
            Self::DeleteSpace { .. } => Command::DeleteSpace,
            Self::DisableCreate => Command::DisableCreate,
            Self::WriteSpace { .. } => Command::WriteSpace,
            Self::ReadSpace { .. } => Command::ReadSpace,
            Self::LockSpaceWrite { .. } => Command::LockSpaceWrite,
            Self::LockSpaceRead { .. } => Command::LockSpaceRead,
        }
    }
}

/// Response payload, one variant per command.
///
/// Payload fields are meaningful only when the envelope result is
/// [`NvResult::Success`]; failure envelopes carry the command's empty shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Geometry and allocation report.
    GetInfo {
        /// Total capacity across all allocatable spaces, in bytes.
        total_size: u64,
        /// Capacity not yet consumed by allocated spaces, in bytes.
        available_size: u64,
        /// Maximum number of allocatable spaces.
        max_spaces: u32,
        /// Indices of the currently allocated spaces.
        space_list: Vec<u32>,
    },
    /// Acknowledgement for [`Command::CreateSpace`].
    CreateSpace,
    /// Parameters and lock state of one space.
    GetSpaceInfo {
        /// Content size in bytes.
        size: u64,
        /// Control bit positions set on the space.
        controls: Vec<u32>,
        /// Whether reads are currently locked out.
        read_locked: bool,
        /// Whether writes are currently locked out.
        write_locked: bool,
    },
    /// Acknowledgement for [`Command::DeleteSpace`].
    DeleteSpace,
    /// Acknowledgement for [`Command::DisableCreate`].
    DisableCreate,
    /// Acknowledgement for [`Command::WriteSpace`].
    WriteSpace,
    /// Contents of a space.
    ReadSpace {
        /// The full space contents.
        buffer: Vec<u8>,
    },
    /// Acknowledgement for [`Command::LockSpaceWrite`].
    LockSpaceWrite,
    /// Acknowledgement for [`Command::LockSpaceRead`].
    LockSpaceRead,
}

impl Response {
    /// Return the command opcode this payload answers.
    #[must_use]
    pub fn command(&self) -> Command {
        match self {
            Self::GetInfo { .. } => Command::GetInfo,
            Self::CreateSpace => Command::CreateSpace,
            Self::GetSpaceInfo { .. } => Command::GetSpaceInfo,
            Self::DeleteSpace => Command::DeleteSpace,
            Self::DisableCreate => Command::DisableCreate,
            Self::WriteSpace => Command::WriteSpace,
            Self::ReadSpace { .. } => Command::ReadSpace,
            Self::LockSpaceWrite => Command::LockSpaceWrite,
            Self::LockSpaceRead => Command::LockSpaceRead,
        }
    }

    /// Build the empty payload shape for `command`, used in failure envelopes.
    #[must_use]
    pub fn empty(command: Command) -> Self {
        match command {
            Command::GetInfo => Self::GetInfo {
                total_size: 0,
                available_size: 0,
                max_spaces: 0,
                space_list: Vec::new(),
            },
            Command::CreateSpace => Self::CreateSpace,
            Command::GetSpaceInfo => Self::GetSpaceInfo {
                size: 0,
                controls: Vec::new(),
                read_locked: false,
                write_locked: false,
            },
            Command::DeleteSpace => Self::DeleteSpace,
            Command::DisableCreate => Self::DisableCreate,
            Command::WriteSpace => Self::WriteSpace,
            Command::ReadSpace => Self::ReadSpace { buffer: Vec::new() },
            Command::LockSpaceWrite => Self::LockSpaceWrite,
            Command::LockSpaceRead => Self::LockSpaceRead,
        }
    }
}

/// Complete response message: result code plus command-matched payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// Outcome of the request.
    pub result: NvResult,
    /// Payload matching the request command.
    pub body: Response,
}

impl ResponseEnvelope {
    /// Wrap a successful payload.
    #[must_use]
    pub fn success(body: Response) -> Self {
        Self {
            result: NvResult::Success,
            body,
        }
    }

    /// Build a failure envelope with the empty payload for `command`.
    #[must_use]
    pub fn failure(command: Command, result: NvResult) -> Self {
        Self {
            result,
            body: Response::empty(command),
        }
    }
}

/// Errors produced while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before the declared fields were complete.
    #[error("truncated message")]
    Truncated,
    /// Extra bytes remained after the message payload.
    #[error("message contains trailing data")]
    TrailingData,
    /// The command byte named no known command.
    #[error("unsupported command {0}")]
    UnsupportedCommand(u8),
    /// The result code named no known result.
    #[error("unsupported result code {0}")]
    UnsupportedResult(u32),
    /// A control list exceeded the encodable count.
    #[error("control list exceeds encodable length")]
    TooManyControls,
    /// A blob exceeded the encodable length.
    #[error("blob exceeds encodable length")]
    BlobTooLarge,
}
