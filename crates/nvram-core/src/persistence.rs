// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Persistent record types, codecs, and the storage gateway trait.
// Author: Lukas Bower

//! Persistent objects of the NVRAM backend.
//!
//! Storage holds exactly one header blob plus one space blob per allocated
//! index, all behind the opaque [`Storage`] trait. Records carry a one-byte
//! object tag so a blob of the wrong kind fails decode. Decoders read only
//! the fields they know and ignore trailing bytes; encoders always produce
//! the canonical minimal form.

use alloc::vec::Vec;

use nvram_wire::NvControl;

const TAG_HEADER: u8 = 0x01;
const TAG_SPACE: u8 = 0x02;

/// Failures reported by the storage gateway and the record codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The requested object is not present.
    #[error("object not found")]
    NotFound,
    /// The stored blob does not decode as the expected record.
    #[error("malformed persistent record: {0}")]
    Corrupt(&'static str),
    /// The backing medium failed.
    #[error("storage backend failure")]
    Backend,
}

/// Opaque blob store consumed by the backend.
///
/// Implementations persist one distinguished header slot plus a sparse set
/// of space slots keyed by index. `delete_space` reports [`StorageError::NotFound`]
/// for absent objects; callers decide whether that is acceptable.
pub trait Storage {
    /// Load the header blob.
    fn load_header(&mut self) -> Result<Vec<u8>, StorageError>;
    /// Store the header blob.
    fn store_header(&mut self, blob: &[u8]) -> Result<(), StorageError>;
    /// Load the space blob for `index`.
    fn load_space(&mut self, index: u32) -> Result<Vec<u8>, StorageError>;
    /// Store the space blob for `index`.
    fn store_space(&mut self, index: u32, blob: &[u8]) -> Result<(), StorageError>;
    /// Delete the space blob for `index`.
    fn delete_space(&mut self, index: u32) -> Result<(), StorageError>;
}

/// Persistent bookkeeping record tying the allocated set together.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NvramHeader {
    /// Storage format version; newer formats are refused at initialization.
    pub version: u32,
    /// Device-level flag bits.
    pub flags: u32,
    /// Indices of all allocated spaces, duplicates forbidden.
    pub allocated_indices: Vec<u32>,
    /// The single index whose space blob may be absent or stale.
    pub provisional_index: Option<u32>,
}

impl NvramHeader {
    /// Current storage format version.
    pub const VERSION: u32 = 1;

    /// Space creation has been permanently disabled.
    pub const FLAG_DISABLE_CREATE: u32 = 1 << 0;

    /// Check a flag bit.
    #[must_use]
    pub fn has_flag(&self, mask: u32) -> bool {
        self.flags & mask != 0
    }

    /// Set a flag bit.
    pub fn set_flag(&mut self, mask: u32) {
        self.flags |= mask;
    }

    /// Serialize into canonical bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.allocated_indices.len() <= u8::MAX as usize);
        let mut out = Vec::new();
        out.push(TAG_HEADER);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.push(self.allocated_indices.len() as u8);
        for index in &self.allocated_indices {
            out.extend_from_slice(&index.to_le_bytes());
        }
        match self.provisional_index {
            Some(index) => {
                out.push(1);
                out.extend_from_slice(&index.to_le_bytes());
            }
            None => out.push(0),
        }
        out
    }

    /// Deserialize from stored bytes, tolerating trailing data.
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        let mut reader = RecordReader::new(bytes);
        if reader.read_u8()? != TAG_HEADER {
            return Err(StorageError::Corrupt("object tag is not a header"));
        }
        let version = reader.read_u32()?;
        let flags = reader.read_u32()?;
        let count = reader.read_u8()? as usize;
        let mut allocated_indices = Vec::with_capacity(count);
        for _ in 0..count {
            allocated_indices.push(reader.read_u32()?);
        }
        let provisional_index = match reader.read_u8()? {
            0 => None,
            _ => Some(reader.read_u32()?),
        };
        Ok(Self {
            version,
            flags,
            allocated_indices,
            provisional_index,
        })
    }
}

/// Persistent state of a single space.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NvramSpace {
    /// Per-space flag bits.
    pub flags: u32,
    /// Bitmask over control positions attached at creation.
    pub controls: u32,
    /// Authorization secret, populated only when an auth control is set.
    pub authorization_value: Vec<u8>,
    /// Space contents, fixed at creation size.
    pub contents: Vec<u8>,
}

impl NvramSpace {
    /// Writes are permanently locked out. Never cleared once set.
    pub const FLAG_WRITE_LOCKED: u32 = 1 << 0;

    /// Check a flag bit.
    #[must_use]
    pub fn has_flag(&self, mask: u32) -> bool {
        self.flags & mask != 0
    }

    /// Set a flag bit.
    pub fn set_flag(&mut self, mask: u32) {
        self.flags |= mask;
    }

    /// Check whether a control is attached to this space.
    #[must_use]
    pub fn has_control(&self, control: NvControl) -> bool {
        self.controls & control.mask() != 0
    }

    /// Serialize into canonical bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.authorization_value.len() <= u16::MAX as usize);
        let mut out = Vec::new();
        out.push(TAG_SPACE);
        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.controls.to_le_bytes());
        out.extend_from_slice(&(self.authorization_value.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.authorization_value);
        out.extend_from_slice(&(self.contents.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.contents);
        out
    }

    /// Deserialize from stored bytes, tolerating trailing data.
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        let mut reader = RecordReader::new(bytes);
        if reader.read_u8()? != TAG_SPACE {
            return Err(StorageError::Corrupt("object tag is not a space"));
        }
        let flags = reader.read_u32()?;
        let controls = reader.read_u32()?;
        let auth_len = reader.read_u16()? as usize;
        let authorization_value = reader.read_exact(auth_len)?.to_vec();
        let contents_len = reader.read_u32()? as usize;
        let contents = reader.read_exact(contents_len)?.to_vec();
        Ok(Self {
            flags,
            controls,
            authorization_value,
            contents,
        })
    }
}

/// Load and decode the header.
pub fn load_header(storage: &mut dyn Storage) -> Result<NvramHeader, StorageError> {
    let blob = storage.load_header()?;
    NvramHeader::decode(&blob)
}

/// Encode and store the header.
pub fn store_header(storage: &mut dyn Storage, header: &NvramHeader) -> Result<(), StorageError> {
    storage.store_header(&header.encode())
}

/// Load and decode the space record for `index`.
pub fn load_space(storage: &mut dyn Storage, index: u32) -> Result<NvramSpace, StorageError> {
    let blob = storage.load_space(index)?;
    NvramSpace::decode(&blob)
}

/// Encode and store the space record for `index`.
pub fn store_space(
    storage: &mut dyn Storage,
    index: u32,
    space: &NvramSpace,
) -> Result<(), StorageError> {
    storage.store_space(index, &space.encode())
}

/// Delete the space blob for `index`.
pub fn delete_space(storage: &mut dyn Storage, index: u32) -> Result<(), StorageError> {
    storage.delete_space(index)
}

struct RecordReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8], StorageError> {
        let end = self.pos.saturating_add(len);
        if end > self.bytes.len() {
            return Err(StorageError::Corrupt("truncated record"));
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, StorageError> {
        Ok(self.read_exact(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, StorageError> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.read_exact(2)?);
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32, StorageError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.read_exact(4)?);
        Ok(u32::from_le_bytes(buf))
    }
}
