//! Frame header validation. Looks at the unparsed bytes without consuming
//! them; the receive buffer applies the result.

use super::{
    OpCode, Role, FIN, LEN_16, LEN_64, LEN_MASK, MASK_BIT, MAX_CONTROL_PAYLOAD, OPCODE_MASK,
    RSV_MASK,
};
use crate::error::ProtocolError;

/// A validated header whose whole frame is present in the examined bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHead {
    pub opcode: OpCode,
    /// Header bytes, mask key included.
    pub header_len: usize,
    pub payload_len: usize,
    pub mask: Option<[u8; 4]>,
}

impl FrameHead {
    /// Header plus payload.
    pub fn frame_len(&self) -> usize {
        self.header_len + self.payload_len
    }
}

/// Examine the start of `buf` for one complete frame.
///
/// `Ok(None)` means more bytes are needed. Structural violations are errors
/// as soon as the two base bytes are available, regardless of length.
pub fn parse_head(buf: &[u8], role: Role) -> Result<Option<FrameHead>, ProtocolError> {
    let &[b0, b1, ..] = buf else {
        return Ok(None);
    };

    if b0 & RSV_MASK != 0 {
        return Err(ProtocolError::ReservedBits);
    }
    if b0 & FIN == 0 {
        return Err(ProtocolError::Fragmented);
    }
    let opcode = OpCode::try_from(b0 & OPCODE_MASK)?;

    let masked = b1 & MASK_BIT != 0;
    if role.requires_masked_incoming() && !masked {
        return Err(ProtocolError::UnmaskedClientFrame);
    }

    let mut header_len = 2;
    let payload_len = match b1 & LEN_MASK {
        LEN_16 => {
            let Some(ext) = buf.get(2..4) else {
                return Ok(None);
            };
            header_len += 2;
            usize::from(u16::from_be_bytes([ext[0], ext[1]]))
        }
        LEN_64 => return Err(ProtocolError::UnsupportedLength),
        len => usize::from(len),
    };

    if opcode.is_control() && payload_len > MAX_CONTROL_PAYLOAD {
        return Err(ProtocolError::ControlFrameTooLarge(payload_len));
    }

    let mask = if masked {
        let Some(key) = buf.get(header_len..header_len + 4) else {
            return Ok(None);
        };
        header_len += 4;
        Some([key[0], key[1], key[2], key[3]])
    } else {
        None
    };

    if buf.len() < header_len + payload_len {
        return Ok(None);
    }

    Ok(Some(FrameHead {
        opcode,
        header_len,
        payload_len,
        mask,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 4] = [0xA1, 0xB2, 0xC3, 0xD4];

    #[test]
    fn needs_two_bytes() {
        assert_eq!(parse_head(&[], Role::Server), Ok(None));
        assert_eq!(parse_head(&[0x81], Role::Server), Ok(None));
    }

    #[test]
    fn structural_errors_win_over_short_input() {
        // RSV1 set.
        assert_eq!(
            parse_head(&[0xC1, 0x80], Role::Server),
            Err(ProtocolError::ReservedBits)
        );
        // FIN clear, otherwise a valid masked text header.
        assert_eq!(
            parse_head(&[0x01, 0x85], Role::Server),
            Err(ProtocolError::Fragmented)
        );
        assert_eq!(
            parse_head(&[0x80, 0x80], Role::Server),
            Err(ProtocolError::ContinuationFrame)
        );
        assert_eq!(
            parse_head(&[0x83, 0x80], Role::Server),
            Err(ProtocolError::UndefinedOpcode(3))
        );
        assert_eq!(
            parse_head(&[0x8B, 0x80], Role::Server),
            Err(ProtocolError::UndefinedOpcode(0xB))
        );
    }

    #[test]
    fn server_requires_mask() {
        let frame = [0x81, 0x02, b'h', b'i'];
        assert_eq!(
            parse_head(&frame, Role::Server),
            Err(ProtocolError::UnmaskedClientFrame)
        );
        let head = parse_head(&frame, Role::Client).unwrap().unwrap();
        assert_eq!(head.opcode, OpCode::Text);
        assert_eq!(head.mask, None);
        assert_eq!(head.frame_len(), 4);
    }

    #[test]
    fn sixty_four_bit_length_rejected() {
        assert_eq!(
            parse_head(&[0x82, 0x80 | 127], Role::Server),
            Err(ProtocolError::UnsupportedLength)
        );
    }

    #[test]
    fn extended_length_needs_its_bytes() {
        assert_eq!(parse_head(&[0x82, 0x80 | 126, 0x01], Role::Server), Ok(None));

        let mut frame = vec![0x82, 0x80 | 126, 0x00, 0x80];
        frame.extend_from_slice(&KEY);
        frame.extend_from_slice(&[0u8; 127]);
        assert_eq!(parse_head(&frame, Role::Server), Ok(None));
        frame.push(0);
        let head = parse_head(&frame, Role::Server).unwrap().unwrap();
        assert_eq!(head.header_len, 8);
        assert_eq!(head.payload_len, 128);
        assert_eq!(head.mask, Some(KEY));
    }

    #[test]
    fn control_payload_bound() {
        let mut ok = vec![0x89, 0x80 | 125];
        ok.extend_from_slice(&KEY);
        ok.extend_from_slice(&[0u8; 125]);
        assert!(parse_head(&ok, Role::Server).unwrap().is_some());

        for opcode in [0x88, 0x89, 0x8A] {
            assert_eq!(
                parse_head(&[opcode, 0x80 | 126, 0x00, 126], Role::Server),
                Err(ProtocolError::ControlFrameTooLarge(126))
            );
        }
    }

    #[test]
    fn mask_key_and_payload_must_be_present() {
        assert_eq!(parse_head(&[0x81, 0x82, 1, 2, 3], Role::Server), Ok(None));
        assert_eq!(parse_head(&[0x81, 0x82, 1, 2, 3, 4, 0], Role::Server), Ok(None));
        assert!(parse_head(&[0x81, 0x82, 1, 2, 3, 4, 0, 0], Role::Server)
            .unwrap()
            .is_some());
    }
}
