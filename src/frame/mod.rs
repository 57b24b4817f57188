//! RFC 6455 frame codec, restricted to the subset this server speaks:
//! no extensions, no fragmentation, masked client frames, at most 16-bit
//! incoming payload lengths.

mod decoder;
mod encoder;

pub use decoder::{parse_head, FrameHead};
pub use encoder::{encode_header, write_frame, Header, MAX_HEADER_LEN};

use crate::error::ProtocolError;

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Largest incoming payload (16-bit extended length).
pub const MAX_INCOMING_PAYLOAD: usize = u16::MAX as usize;

pub(crate) const FIN: u8 = 0x80;
pub(crate) const RSV_MASK: u8 = 0x70;
pub(crate) const OPCODE_MASK: u8 = 0x0F;
pub(crate) const MASK_BIT: u8 = 0x80;
pub(crate) const LEN_MASK: u8 = 0x7F;
pub(crate) const LEN_16: u8 = 126;
pub(crate) const LEN_64: u8 = 127;

/// Frame opcodes that survive validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl OpCode {
    /// Close, ping and pong.
    pub fn is_control(self) -> bool {
        (self as u8) & 0x8 != 0
    }
}

impl TryFrom<u8> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Err(ProtocolError::ContinuationFrame),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(ProtocolError::UndefinedOpcode(other)),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(value: OpCode) -> Self {
        value as u8
    }
}

/// Which end of the connection we are. Decides masking in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    /// Whether frames we send must be masked.
    pub fn masks_outgoing(self) -> bool {
        self == Role::Client
    }

    /// Whether frames we receive must be masked.
    pub fn requires_masked_incoming(self) -> bool {
        self == Role::Server
    }
}

/// XOR `payload` with the repeating key, where `payload[0]` sits at byte
/// `offset` of the frame payload.
pub(crate) fn apply_mask(payload: &mut [u8], key: [u8; 4], offset: usize) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[(offset + i) & 3];
    }
}
