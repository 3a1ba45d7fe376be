// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Encode and decode NVRAM service wire messages.
// Author: Lukas Bower

//! Encode/decode helpers for NVRAM wire messages.
//!
//! Layout: one command byte, then little-endian fields. Responses insert the
//! `u32` result code between the command byte and the payload. Blobs are
//! `u32` length plus bytes; control lists are `u8` count plus `u32` values.

use alloc::vec::Vec;

use crate::types::*;

/// Encode a request into its wire representation.
pub fn encode_request(request: &Request) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    out.push(request.command() as u8);
    match request {
        Request::GetInfo | Request::DisableCreate => {}
        Request::CreateSpace {
            index,
            size,
            controls,
            authorization_value,
        } => {
            out.extend_from_slice(&index.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            put_u32_list(&mut out, controls)?;
            put_blob(&mut out, authorization_value)?;
        }
        Request::GetSpaceInfo { index } => {
            out.extend_from_slice(&index.to_le_bytes());
        }
        Request::WriteSpace {
            index,
            buffer,
            authorization_value,
        } => {
            out.extend_from_slice(&index.to_le_bytes());
            put_blob(&mut out, buffer)?;
            put_blob(&mut out, authorization_value)?;
        }
        Request::DeleteSpace {
            index,
            authorization_value,
        }
        | Request::ReadSpace {
            index,
            authorization_value,
        }
        | Request::LockSpaceWrite {
            index,
            authorization_value,
        }
        | Request::LockSpaceRead {
            index,
            authorization_value,
        } => {
            out.extend_from_slice(&index.to_le_bytes());
            put_blob(&mut out, authorization_value)?;
        }
    }
    Ok(out)
}

/// Decode a request from its wire representation.
pub fn decode_request(bytes: &[u8]) -> Result<Request, CodecError> {
    let mut cursor = Cursor::new(bytes);
    let command = Command::try_from(cursor.read_u8()?)?;
    let request = match command {
        Command::GetInfo => Request::GetInfo,
        Command::CreateSpace => Request::CreateSpace {
            index: cursor.read_u32()?,
            size: cursor.read_u64()?,
            controls: cursor.read_u32_list()?,
            authorization_value: cursor.read_blob()?,
        },
        Command::GetSpaceInfo => Request::GetSpaceInfo {
            index: cursor.read_u32()?,
        },
        Command::DeleteSpace => Request::DeleteSpace {
            index: cursor.read_u32()?,
            authorization_value: cursor.read_blob()?,
        },
        Command::DisableCreate => Request::DisableCreate,
        Command::WriteSpace => Request::WriteSpace {
            index: cursor.read_u32()?,
            buffer: cursor.read_blob()?,
            authorization_value: cursor.read_blob()?,
        },
        Command::ReadSpace => Request::ReadSpace {
            index: cursor.read_u32()?,
            authorization_value: cursor.read_blob()?,
        },
        Command::LockSpaceWrite => Request::LockSpaceWrite {
            index: cursor.read_u32()?,
            authorization_value: cursor.read_blob()?,
        },
        Command::LockSpaceRead => Request::LockSpaceRead {
            index: cursor.read_u32()?,
            authorization_value: cursor.read_blob()?,
        },
    };
    cursor.ensure_empty()?;
    Ok(request)
}

/// Encode a response envelope into its wire representation.
pub fn encode_response(envelope: &ResponseEnvelope) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    out.push(envelope.body.command() as u8);
    out.extend_from_slice(&(envelope.result as u32).to_le_bytes());
    match &envelope.body {
        Response::GetInfo {
            total_size,
            available_size,
            max_spaces,
            space_list,
        } => {
            out.extend_from_slice(&total_size.to_le_bytes());
            out.extend_from_slice(&available_size.to_le_bytes());
            out.extend_from_slice(&max_spaces.to_le_bytes());
            put_u32_list(&mut out, space_list)?;
        }
        Response::GetSpaceInfo {
            size,
            controls,
            read_locked,
            write_locked,
        } => {
            out.extend_from_slice(&size.to_le_bytes());
            put_u32_list(&mut out, controls)?;
            out.push(u8::from(*read_locked));
            out.push(u8::from(*write_locked));
        }
        Response::ReadSpace { buffer } => {
            put_blob(&mut out, buffer)?;
        }
        Response::CreateSpace
        | Response::DeleteSpace
        | Response::DisableCreate
        | Response::WriteSpace
        | Response::LockSpaceWrite
        | Response::LockSpaceRead => {}
    }
    Ok(out)
}

/// Decode a response envelope from its wire representation.
pub fn decode_response(bytes: &[u8]) -> Result<ResponseEnvelope, CodecError> {
    let mut cursor = Cursor::new(bytes);
    let command = Command::try_from(cursor.read_u8()?)?;
    let result = NvResult::from_wire(cursor.read_u32()?)?;
    let body = match command {
        Command::GetInfo => Response::GetInfo {
            total_size: cursor.read_u64()?,
            available_size: cursor.read_u64()?,
            max_spaces: cursor.read_u32()?,
            space_list: cursor.read_u32_list()?,
        },
        Command::CreateSpace => Response::CreateSpace,
        Command::GetSpaceInfo => Response::GetSpaceInfo {
            size: cursor.read_u64()?,
            controls: cursor.read_u32_list()?,
            read_locked: cursor.read_u8()? != 0,
            write_locked: cursor.read_u8()? != 0,
        },
        Command::DeleteSpace => Response::DeleteSpace,
        Command::DisableCreate => Response::DisableCreate,
        Command::WriteSpace => Response::WriteSpace,
        Command::ReadSpace => Response::ReadSpace {
            buffer: cursor.read_blob()?,
        },
        Command::LockSpaceWrite => Response::LockSpaceWrite,
        Command::LockSpaceRead => Response::LockSpaceRead,
    };
    cursor.ensure_empty()?;
    Ok(ResponseEnvelope { result, body })
}

fn put_blob(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), CodecError> {
    let len: u32 = bytes.len().try_into().map_err(|_| CodecError::BlobTooLarge)?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn put_u32_list(out: &mut Vec<u8>, values: &[u32]) -> Result<(), CodecError> {
    let count: u8 = values
        .len()
        .try_into()
        .map_err(|_| CodecError::TooManyControls)?;
    out.push(count);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_exact(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.saturating_add(len);
        if end > self.bytes.len() {
            return Err(CodecError::Truncated);
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_exact(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, CodecError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.read_exact(4)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64, CodecError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_exact(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_blob(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_u32()? as usize;
        Ok(self.read_exact(len)?.to_vec())
    }

    fn read_u32_list(&mut self) -> Result<Vec<u32>, CodecError> {
        let count = self.read_u8()? as usize;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_u32()?);
        }
        Ok(values)
    }

    fn ensure_empty(&self) -> Result<(), CodecError> {
        if self.pos == self.bytes.len() {
            Ok(())
        } else {
            Err(CodecError::TrailingData)
        }
    }
}
