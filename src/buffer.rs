//! Per-connection receive buffer.
//!
//! One owned byte store with a read cursor:
//!
//! ```text
//! 0 ........ consumed ........ size ........ capacity
//! | parsed   | unparsed        | free        |
//! ```
//!
//! Frames are decoded from the unparsed region and unmasked in place, so a
//! decoded payload aliases the store. [`Frame`] handles carry the generation
//! they were decoded in and stop resolving once the buffer changes again.

use crate::error::{Error, ProtocolError, Result};
use crate::frame::{apply_mask, parse_head, OpCode, Role};
use std::ops::Range;

/// Capacity of the first allocation.
pub const INITIAL_CAPACITY: usize = 4096;

/// Result of a decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// Not enough bytes for the next frame yet.
    NoFrame,
    /// A complete frame was consumed.
    Frame(Frame),
    /// The unparsed bytes violate the protocol.
    Error(ProtocolError),
}

/// A decoded frame. The payload lives in the buffer it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: OpCode,
    payload: Range<usize>,
    /// Bytes consumed from the buffer: header, mask key and payload.
    len: usize,
    generation: u64,
}

impl Frame {
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Bytes the frame occupied on the wire.
    pub fn frame_len(&self) -> usize {
        self.len
    }
}

/// Growable receive store with a parse cursor.
#[derive(Debug, Default)]
pub struct RecvBuffer {
    /// Allocated store; its length is the capacity.
    data: Vec<u8>,
    size: usize,
    consumed: usize,
    generation: u64,
}

impl RecvBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Bytes not yet parsed.
    pub fn available(&self) -> usize {
        self.size - self.consumed
    }

    pub fn unparsed(&self) -> &[u8] {
        &self.data[self.consumed..self.size]
    }

    /// Slide unparsed bytes to the front once the parsed prefix reaches half the
    /// capacity; a fully parsed buffer is simply reset.
    pub fn compact(&mut self) {
        if self.consumed == 0 {
            return;
        }
        let available = self.available();
        if available == 0 {
            self.size = 0;
            self.consumed = 0;
            self.generation += 1;
        } else if self.consumed >= self.capacity() / 2 {
            self.data.copy_within(self.consumed..self.size, 0);
            self.size = available;
            self.consumed = 0;
            self.generation += 1;
        }
    }

    /// Make room for at least `extra` more bytes, doubling the capacity.
    pub fn reserve(&mut self, extra: usize) -> Result<()> {
        let need = self.size.checked_add(extra).ok_or(Error::BufferExhausted)?;
        if need <= self.capacity() {
            return Ok(());
        }

        let mut new_cap = if self.capacity() == 0 {
            INITIAL_CAPACITY
        } else {
            self.capacity()
        };
        while new_cap < need {
            new_cap = new_cap.checked_mul(2).ok_or(Error::BufferExhausted)?;
        }

        self.data
            .try_reserve_exact(new_cap - self.data.len())
            .map_err(|_| Error::BufferExhausted)?;
        self.data.resize(new_cap, 0);
        tracing::trace!(capacity = new_cap, "receive buffer grown");
        Ok(())
    }

    /// Compact, then guarantee `min_free` writable bytes and hand them out.
    /// Follow with [`commit`](Self::commit) for however many were filled.
    pub fn prepare(&mut self, min_free: usize) -> Result<&mut [u8]> {
        self.compact();
        self.reserve(min_free)?;
        Ok(&mut self.data[self.size..])
    }

    /// Mark `n` bytes of the free region as valid.
    pub fn commit(&mut self, n: usize) {
        assert!(n <= self.capacity() - self.size, "commit past capacity");
        self.size += n;
        self.generation += 1;
    }

    /// Copy bytes in, growing as needed.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        let free = self.prepare(bytes.len())?;
        free[..bytes.len()].copy_from_slice(bytes);
        self.commit(bytes.len());
        Ok(())
    }

    /// Decode one frame from the unparsed region.
    ///
    /// A masked payload is unmasked in place and the cursor moves past the
    /// frame; nothing is consumed for `NoFrame` or `Error`.
    pub fn decode(&mut self, role: Role) -> Decoded {
        let head = match parse_head(self.unparsed(), role) {
            Ok(Some(head)) => head,
            Ok(None) => return Decoded::NoFrame,
            Err(e) => return Decoded::Error(e),
        };

        let start = self.consumed + head.header_len;
        let payload = start..start + head.payload_len;
        if let Some(key) = head.mask {
            apply_mask(&mut self.data[payload.clone()], key, 0);
        }
        self.consumed += head.frame_len();
        self.generation += 1;

        Decoded::Frame(Frame {
            opcode: head.opcode,
            payload,
            len: head.frame_len(),
            generation: self.generation,
        })
    }

    /// Payload of the most recently decoded frame.
    ///
    /// `None` once the buffer has been read into, compacted or decoded again.
    pub fn payload(&self, frame: &Frame) -> Option<&[u8]> {
        (frame.generation == self.generation).then(|| &self.data[frame.payload.clone()])
    }

    /// Drop all contents and the allocation.
    pub fn clear(&mut self) {
        self.data = Vec::new();
        self.size = 0;
        self.consumed = 0;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::write_frame;
    use proptest::prelude::*;

    fn client_frame(opcode: OpCode, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_frame(&mut out, opcode, payload, Role::Client, usize::MAX).unwrap();
        out
    }

    fn expect_frame(buf: &mut RecvBuffer) -> Frame {
        match buf.decode(Role::Server) {
            Decoded::Frame(frame) => frame,
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn round_trip_lengths() {
        for len in [0usize, 1, 125, 126, 65535] {
            for opcode in [OpCode::Text, OpCode::Binary] {
                let payload: Vec<u8> = (0..len).map(|i| (i * 7) as u8).collect();
                let bytes = client_frame(opcode, &payload);
                let mut buf = RecvBuffer::new();
                buf.append(&bytes).unwrap();

                let frame = expect_frame(&mut buf);
                assert_eq!(frame.opcode, opcode);
                assert_eq!(buf.payload(&frame).unwrap(), &payload[..], "len {len}");
                assert_eq!(frame.frame_len(), bytes.len());
                assert_eq!(buf.consumed(), bytes.len());
                assert_eq!(buf.available(), 0);
            }
        }
    }

    #[test]
    fn partial_frame_reassembly() {
        let bytes = client_frame(OpCode::Text, b"split me please");
        let mut buf = RecvBuffer::new();

        buf.append(&bytes[..5]).unwrap();
        assert_eq!(buf.decode(Role::Server), Decoded::NoFrame);
        assert_eq!(buf.consumed(), 0);

        buf.append(&bytes[5..]).unwrap();
        let frame = expect_frame(&mut buf);
        assert_eq!(buf.payload(&frame).unwrap(), b"split me please");
    }

    #[test]
    fn unmasked_client_frame_is_error() {
        let mut buf = RecvBuffer::new();
        buf.append(&[0x81, 0x02, b'h', b'i']).unwrap();
        assert_eq!(
            buf.decode(Role::Server),
            Decoded::Error(ProtocolError::UnmaskedClientFrame)
        );
        assert_eq!(buf.consumed(), 0);
    }

    #[test]
    fn fin_clear_is_error() {
        let mut bytes = client_frame(OpCode::Binary, b"abc");
        bytes[0] &= !0x80;
        let mut buf = RecvBuffer::new();
        buf.append(&bytes).unwrap();
        assert_eq!(
            buf.decode(Role::Server),
            Decoded::Error(ProtocolError::Fragmented)
        );
    }

    #[test]
    fn several_frames_in_one_read() {
        let mut bytes = client_frame(OpCode::Text, b"one");
        bytes.extend(client_frame(OpCode::Binary, b"two"));
        let mut buf = RecvBuffer::new();
        buf.append(&bytes).unwrap();

        let first = expect_frame(&mut buf);
        assert_eq!(buf.payload(&first).unwrap(), b"one");
        let second = expect_frame(&mut buf);
        assert_eq!(second.opcode, OpCode::Binary);
        assert_eq!(buf.payload(&second).unwrap(), b"two");
        assert_eq!(buf.payload(&first), None);
        assert_eq!(buf.decode(Role::Server), Decoded::NoFrame);
    }

    #[test]
    fn compaction_and_growth() {
        let mut buf = RecvBuffer::new();
        buf.reserve(1).unwrap();
        assert_eq!(buf.capacity(), INITIAL_CAPACITY);

        buf.reserve(INITIAL_CAPACITY * 3).unwrap();
        assert_eq!(buf.capacity(), INITIAL_CAPACITY * 4);

        let frame = client_frame(OpCode::Binary, &[7u8; 2500]);
        buf.append(&frame).unwrap();
        buf.append(&frame[..10]).unwrap();
        expect_frame(&mut buf);
        assert_eq!(buf.available(), 10);

        // Consumed prefix is below half of the capacity: left alone.
        buf.compact();
        assert_eq!(buf.consumed(), frame.len());

        let mut buf = RecvBuffer::new();
        buf.append(&frame).unwrap();
        buf.append(&frame[..10]).unwrap();
        expect_frame(&mut buf);
        buf.compact();
        assert_eq!(buf.consumed(), 0);
        assert_eq!(buf.size(), 10);
        assert_eq!(buf.unparsed(), &frame[..10]);
    }

    #[test]
    fn fully_consumed_buffer_resets() {
        let mut buf = RecvBuffer::new();
        buf.append(&client_frame(OpCode::Text, b"x")).unwrap();
        expect_frame(&mut buf);
        buf.compact();
        assert_eq!((buf.size(), buf.consumed()), (0, 0));
    }

    proptest! {
        #[test]
        fn cursor_invariant_holds(
            payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..300), 1..20),
            cuts in proptest::collection::vec(1usize..97, 1..40),
        ) {
            let mut stream = Vec::new();
            for p in &payloads {
                stream.extend(client_frame(OpCode::Binary, p));
            }

            let mut buf = RecvBuffer::new();
            let mut decoded = Vec::new();
            let mut offset = 0;
            let mut cuts = cuts.into_iter().cycle();
            while offset < stream.len() {
                let end = (offset + cuts.next().unwrap()).min(stream.len());
                buf.append(&stream[offset..end]).unwrap();
                offset = end;

                while let Decoded::Frame(frame) = buf.decode(Role::Server) {
                    prop_assert!(frame.payload.end <= buf.size());
                    decoded.push(buf.payload(&frame).unwrap().to_vec());
                }
                prop_assert!(buf.consumed() <= buf.size());
                prop_assert!(buf.size() <= buf.capacity());
            }

            prop_assert_eq!(decoded, payloads);
        }
    }
}
