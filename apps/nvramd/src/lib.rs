// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Host daemon library for the access-controlled NVRAM service.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Host-side plumbing for the NVRAM backend: a file-backed [`storage`]
//! implementation and a length-prefixed frame [`server`] that feeds decoded
//! requests to the manager one at a time.

pub mod server;
pub mod storage;
