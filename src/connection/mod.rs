//! Connection state machine.
//!
//! Composes the receive buffer, the frame codec and a [`Transport`] into the
//! poll API. Control frames are answered here and never reach the caller.

use crate::buffer::{Decoded, Frame, RecvBuffer};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::frame::{write_frame, OpCode, Role, MAX_CONTROL_PAYLOAD};
use crate::socket::{recv_some, Sender, TcpTransport};
use crate::transport::Transport;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a connection.
///
/// Closing is not a resting state: a close frame sent or received finishes
/// the teardown within the same call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Open,
    /// Terminal. The transport is gone and every operation fails.
    Destroyed,
}

/// An upgraded WebSocket connection.
///
/// Created by [`Server::accept`](crate::Server::accept). Dropping it performs
/// the same best-effort close as [`Connection::destroy`].
pub struct Connection<T: Transport = TcpTransport> {
    id: u64,
    transport: Option<T>,
    buffer: RecvBuffer,
    role: Role,
    state: State,
    close_sent: bool,
    close_received: bool,
    max_frame_size: usize,
    read_increment: usize,
    send_timeout: Duration,
    close_code: u16,
}

impl<T: Transport> Connection<T> {
    /// Wrap a transport whose handshake has already completed.
    pub fn new(transport: T, role: Role, config: &Config) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(conn = id, ?role, "connection open");
        Self {
            id,
            transport: Some(transport),
            buffer: RecvBuffer::new(),
            role,
            state: State::Open,
            close_sent: false,
            close_received: false,
            max_frame_size: config.max_frame_size,
            read_increment: config.read_increment,
            send_timeout: config.send_timeout,
            close_code: config.close_code,
        }
    }

    /// Process-unique id used in log records.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Whether the connection can still send and receive.
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    /// Whether the peer sent a close frame.
    pub fn close_received(&self) -> bool {
        self.close_received
    }

    /// Send one text frame. The bytes are sent as given.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        self.send_message(OpCode::Text, text.as_bytes())
    }

    /// Send one binary frame.
    pub fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.send_message(OpCode::Binary, data)
    }

    /// Wait up to `timeout` for the next message.
    ///
    /// Frames already buffered are decoded before any new read, and at most one
    /// read is attempted per call. Pings are answered with a pong carrying the
    /// same payload and yield [`Event::None`]. A close frame, a protocol
    /// violation or a transport failure tears the connection down and yields
    /// [`Event::Closed`]; so does every later call.
    pub fn poll_event(&mut self, timeout: Duration) -> Event<'_> {
        if self.state == State::Destroyed {
            return Event::Closed;
        }

        let frame = match self.next_message(timeout) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Event::None,
            Err(e) => {
                self.fail(&e);
                return Event::Closed;
            }
        };

        let payload = self.buffer.payload(&frame).unwrap_or_default();
        match frame.opcode {
            OpCode::Text => Event::Text(payload),
            OpCode::Binary => Event::Binary(payload),
            OpCode::Close | OpCode::Ping | OpCode::Pong => Event::None,
        }
    }

    /// Close the connection: best-effort close frame, then shutdown.
    pub fn destroy(mut self) {
        self.teardown();
    }

    fn send_message(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        if self.state != State::Open {
            return Err(Error::Closed);
        }
        match self.send_frame(opcode, payload) {
            Ok(()) => Ok(()),
            // Nothing was written; the stream is still in sync.
            Err(e @ Error::FrameTooLarge { .. }) => Err(e),
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn send_frame(&mut self, opcode: OpCode, payload: &[u8]) -> Result<()> {
        let transport = self.transport.as_mut().ok_or(Error::Closed)?;
        let mut sender = Sender::new(transport, self.send_timeout);
        write_frame(&mut sender, opcode, payload, self.role, self.max_frame_size)
    }

    /// Next text or binary frame, answering control frames on the way.
    fn next_message(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        let mut decoded = self.buffer.decode(self.role);
        if decoded == Decoded::NoFrame {
            if !self.fill(timeout)? {
                return Ok(None);
            }
            decoded = self.buffer.decode(self.role);
        }

        let frame = match decoded {
            Decoded::NoFrame => return Ok(None),
            Decoded::Error(e) => return Err(e.into()),
            Decoded::Frame(frame) => frame,
        };
        tracing::trace!(
            conn = self.id,
            opcode = ?frame.opcode,
            len = frame.payload_len(),
            wire_len = frame.frame_len(),
            "frame received"
        );

        match frame.opcode {
            OpCode::Text | OpCode::Binary => Ok(Some(frame)),
            OpCode::Ping => {
                let mut echo = [0u8; MAX_CONTROL_PAYLOAD];
                let data = self.buffer.payload(&frame).unwrap_or_default();
                let len = data.len();
                echo[..len].copy_from_slice(data);
                self.send_frame(OpCode::Pong, &echo[..len])?;
                Ok(None)
            }
            OpCode::Pong => Ok(None),
            OpCode::Close => {
                self.close_received = true;
                let data = self.buffer.payload(&frame).unwrap_or_default();
                let code = match *data {
                    [hi, lo, ..] => Some(u16::from_be_bytes([hi, lo])),
                    _ => None,
                };
                tracing::debug!(conn = self.id, ?code, "close frame received");
                Err(Error::Closed)
            }
        }
    }

    /// One bounded read into the buffer. `Ok(false)` when nothing arrived.
    fn fill(&mut self, timeout: Duration) -> Result<bool> {
        let transport = self.transport.as_mut().ok_or(Error::Closed)?;
        let free = self.buffer.prepare(self.read_increment)?;
        match recv_some(transport, free, timeout)? {
            Some(n) => {
                self.buffer.commit(n);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn fail(&mut self, error: &Error) {
        match error {
            Error::Protocol(e) => tracing::warn!(conn = self.id, error = %e, "protocol violation"),
            Error::Closed if self.close_received => {}
            Error::Closed => tracing::debug!(conn = self.id, "peer closed"),
            e => tracing::debug!(conn = self.id, error = %e, "connection failed"),
        }
        self.teardown();
    }

    /// Idempotent: close frame once, shutdown, release transport and buffer.
    fn teardown(&mut self) {
        if self.state == State::Destroyed {
            return;
        }

        if !self.close_sent {
            self.close_sent = true;
            let code = self.close_code.to_be_bytes();
            if let Err(e) = self.send_frame(OpCode::Close, &code) {
                tracing::trace!(conn = self.id, error = %e, "close frame not sent");
            }
        }

        if let Some(mut transport) = self.transport.take() {
            transport.shutdown();
        }
        self.buffer.clear();
        self.state = State::Destroyed;
        tracing::debug!(conn = self.id, "connection destroyed");
    }
}

impl Connection<TcpTransport> {
    /// Remote address of the underlying socket.
    pub fn peer_addr(&self) -> Option<std::net::SocketAddr> {
        self.transport.as_ref().and_then(TcpTransport::peer_addr)
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state)
            .field("close_sent", &self.close_sent)
            .field("close_received", &self.close_received)
            .finish_non_exhaustive()
    }
}
