// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide NVRAM service wire types and codec primitives.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! Wire message model for the access-controlled NVRAM service.
//!
//! Every client command is a tagged [`Request`] variant; the service answers
//! with a [`ResponseEnvelope`] carrying a [`NvResult`] code and the matching
//! [`Response`] payload. Encoding is little-endian with a leading command
//! byte and is strict: trailing bytes, truncation, and unknown command bytes
//! are decode errors.

extern crate alloc;

#[cfg(test)]
extern crate std;

mod codec;
mod types;

pub use codec::{decode_request, decode_response, encode_request, encode_response};
pub use types::*;
