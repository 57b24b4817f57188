//! Frame encoder. Writes header then payload; client-role payloads are masked
//! in fixed-size chunks so large frames never need a second full-size copy.

use super::{apply_mask, OpCode, Role, FIN, LEN_16, LEN_64, MASK_BIT};
use crate::error::{Error, Result};
use crate::socket::io_error;
use std::io::Write;

/// 2 base bytes + 8 length bytes + 4 mask bytes.
pub const MAX_HEADER_LEN: usize = 14;

const MASK_CHUNK: usize = 4096;

/// An encoded frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    buf: [u8; MAX_HEADER_LEN],
    len: usize,
    mask: Option<[u8; 4]>,
}

impl Header {
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn mask(&self) -> Option<[u8; 4]> {
        self.mask
    }
}

/// Build a FIN-set header for `opcode` and `payload_len`, with the shortest
/// length encoding and an optional masking key.
pub fn encode_header(opcode: OpCode, payload_len: u64, mask: Option<[u8; 4]>) -> Header {
    let mut buf = [0u8; MAX_HEADER_LEN];
    let mask_bit = if mask.is_some() { MASK_BIT } else { 0 };

    buf[0] = FIN | u8::from(opcode);
    let mut len = 2;
    if payload_len <= 125 {
        buf[1] = mask_bit | payload_len as u8;
    } else if payload_len <= u64::from(u16::MAX) {
        buf[1] = mask_bit | LEN_16;
        buf[2..4].copy_from_slice(&(payload_len as u16).to_be_bytes());
        len += 2;
    } else {
        buf[1] = mask_bit | LEN_64;
        buf[2..10].copy_from_slice(&payload_len.to_be_bytes());
        len += 8;
    }

    if let Some(key) = mask {
        buf[len..len + 4].copy_from_slice(&key);
        len += 4;
    }

    Header { buf, len, mask }
}

/// Encode one complete frame into `out`.
///
/// Masking follows `role`: clients draw a fresh random key per frame, servers
/// send the payload as is. Payloads over `max_size` are refused before any
/// byte is written.
pub fn write_frame<W: Write + ?Sized>(
    out: &mut W,
    opcode: OpCode,
    payload: &[u8],
    role: Role,
    max_size: usize,
) -> Result<()> {
    if payload.len() > max_size {
        return Err(Error::FrameTooLarge {
            len: payload.len(),
            max: max_size,
        });
    }

    let key = role.masks_outgoing().then(rand::random::<[u8; 4]>);
    let header = encode_header(opcode, payload.len() as u64, key);
    out.write_all(header.as_bytes()).map_err(io_error)?;

    match header.mask() {
        None => out.write_all(payload).map_err(io_error)?,
        Some(key) => {
            let mut chunk = [0u8; MASK_CHUNK];
            for (i, src) in payload.chunks(MASK_CHUNK).enumerate() {
                let masked = &mut chunk[..src.len()];
                masked.copy_from_slice(src);
                apply_mask(masked, key, i * MASK_CHUNK);
                out.write_all(masked).map_err(io_error)?;
            }
        }
    }

    tracing::trace!(?opcode, len = payload.len(), masked = key.is_some(), "frame sent");
    Ok(())
}
