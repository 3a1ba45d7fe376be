// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Length-prefixed frame loop feeding requests to the NVRAM manager.
// Author: Lukas Bower

//! Frame transport for the NVRAM daemon.
//!
//! Requests and responses travel as 4-byte little-endian length prefixes
//! followed by the wire-encoded message. Connections are served one at a
//! time and frames strictly in arrival order; the manager is never shared.

use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};

use log::{error, info, warn};
use nvram_core::persistence::Storage;
use nvram_core::NvramManager;
use nvram_wire::{decode_request, encode_response, Command, NvResult, ResponseEnvelope};

/// Upper bound on a single frame payload.
pub const MAX_FRAME_LEN: usize = 8192;

/// Accept connections forever, serving them sequentially.
pub fn run<S: Storage>(manager: &mut NvramManager<S>, listener: &TcpListener) -> io::Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Ok(peer) = stream.peer_addr() {
                    info!("[nvramd] connection from {peer}");
                }
                if let Err(err) = serve_connection(manager, &mut stream) {
                    warn!("[nvramd] connection ended with error: {err}");
                }
            }
            Err(err) => warn!("[nvramd] accept failed: {err}"),
        }
    }
    Ok(())
}

/// Serve request frames from one connection until it closes.
pub fn serve_connection<S: Storage>(
    manager: &mut NvramManager<S>,
    stream: &mut TcpStream,
) -> io::Result<()> {
    loop {
        let frame = match read_frame(stream)? {
            Some(frame) => frame,
            None => return Ok(()),
        };
        let response = execute_frame(manager, &frame);
        write_frame(stream, &response)?;
    }
}

/// Decode one request frame, dispatch it, and encode the response envelope.
///
/// A frame that does not decode is answered with an `InvalidParameter`
/// envelope rather than dropping the connection.
pub fn execute_frame<S: Storage>(manager: &mut NvramManager<S>, frame: &[u8]) -> Vec<u8> {
    let request = match decode_request(frame) {
        Ok(request) => request,
        Err(err) => {
            warn!("[nvramd] rejecting undecodable request: {err}");
            let envelope = ResponseEnvelope::failure(Command::GetInfo, NvResult::InvalidParameter);
            return encode_response(&envelope).unwrap_or_default();
        }
    };
    let envelope = manager.dispatch(&request);
    match encode_response(&envelope) {
        Ok(bytes) => bytes,
        Err(err) => {
            error!("[nvramd] failed to encode response: {err}");
            let fallback = ResponseEnvelope::failure(request.command(), NvResult::InternalError);
            encode_response(&fallback).unwrap_or_default()
        }
    }
}

/// Read one length-prefixed frame. `None` means the peer closed cleanly.
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err),
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame length exceeds limit",
        ));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Write one length-prefixed frame.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    let len: u32 = payload
        .len()
        .try_into()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame payload too large"))?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}
