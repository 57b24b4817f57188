use thiserror::Error;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while accepting, reading or writing WebSocket traffic.
///
/// Every variant except [`Error::Timeout`] is fatal to the connection it came
/// from; the poll API folds them into [`Event::Closed`](crate::Event::Closed).
#[derive(Error, Debug)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("timeout")]
    Timeout,

    #[error("handshake: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("protocol: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },

    #[error("receive buffer could not grow")]
    BufferExhausted,

    #[error("connection closed")]
    Closed,

    #[error("config: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error is a peer protocol violation rather than a transport failure.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Whether the error only means "nothing happened in time".
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// HTTP upgrade failures. Fatal to the accept attempt only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    #[error("request exceeds {max} bytes")]
    RequestTooLarge { max: usize },

    #[error("request ended before the header terminator")]
    Incomplete,

    #[error("missing Sec-WebSocket-Key header")]
    MissingKey,

    #[error("accept value could not be encoded")]
    Encode,

    #[error("Sec-WebSocket-Key of {len} bytes is too long")]
    KeyTooLong { len: usize },
}

/// Frame-level violations of the supported RFC 6455 subset.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("reserved bits set")]
    ReservedBits,

    #[error("fragmented frame (FIN not set)")]
    Fragmented,

    #[error("continuation frame")]
    ContinuationFrame,

    #[error("undefined opcode {0:#x}")]
    UndefinedOpcode(u8),

    #[error("unmasked client frame")]
    UnmaskedClientFrame,

    #[error("64-bit payload length not supported")]
    UnsupportedLength,

    #[error("control frame payload of {0} bytes (max 125)")]
    ControlFrameTooLarge(usize),
}
