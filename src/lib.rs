//! # mini-ws
//!
//! Minimal, embeddable, blocking WebSocket server (a restricted RFC 6455 subset).
//!
//! ## Features
//!
//! - HTTP/1.1 upgrade handshake with built-in SHA-1 accept-key computation
//! - Unfragmented text and binary messages, incoming payloads up to 64 KiB
//! - Automatic pong replies, close handling, normal-closure teardown
//! - Single-threaded poll API; every blocking step is bounded by a timeout
//! - Pluggable [`Transport`] so the protocol layers run over any byte stream
//!
//! Not supported: TLS, extensions, subprotocols, fragmentation, client mode.
//!
//! ## Example
//!
//! ```ignore
//! use mini_ws::{Event, Server};
//! use std::time::Duration;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut server = Server::create(8080)?;
//!     loop {
//!         let Some(mut conn) = server.accept(Duration::from_secs(1)) else {
//!             continue;
//!         };
//!         loop {
//!             match conn.poll_event(Duration::from_millis(100)) {
//!                 Event::Text(_) => conn.send_text("Hello, WebSocket!")?,
//!                 Event::Binary(data) => {
//!                     let echo = data.to_vec();
//!                     conn.send_binary(&echo)?
//!                 }
//!                 Event::Closed => break,
//!                 Event::None => {}
//!             }
//!         }
//!     }
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod frame;
pub mod handshake;
pub mod server;
pub mod socket;
pub mod transport;

pub use buffer::{Decoded, Frame, RecvBuffer};
pub use config::Config;
pub use connection::{Connection, State};
pub use error::{Error, HandshakeError, ProtocolError, Result};
pub use events::Event;
pub use frame::{OpCode, Role};
pub use server::{create_server, Server};
pub use socket::TcpTransport;
pub use transport::Transport;
