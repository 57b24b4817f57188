//! Listening endpoint.

use crate::config::Config;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::frame::Role;
use crate::handshake;
use crate::socket::{wait_ready, Interest, TcpTransport};
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::time::Duration;

/// A bound, listening WebSocket server.
///
/// Dropping the server closes the listening socket. Connections already
/// accepted are independent of it.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    config: Config,
}

impl Server {
    /// Listen on `0.0.0.0:port` with default settings.
    pub fn create(port: u16) -> Result<Self> {
        Self::bind(
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            &Config::default(),
        )
    }

    /// Listen on `addr` with address reuse enabled and the configured backlog.
    pub fn bind(addr: SocketAddr, config: &Config) -> Result<Self> {
        config.validate()?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&addr.into())?;
        socket.listen(config.backlog)?;
        socket.set_nonblocking(true)?;

        let listener: TcpListener = socket.into();
        tracing::debug!(addr = %listener.local_addr()?, backlog = config.backlog, "listening");
        Ok(Self {
            listener,
            config: config.clone(),
        })
    }

    /// Address the listener is bound to (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait up to `timeout` for a client and upgrade it.
    ///
    /// The handshake gets the same timeout for each of its reads and writes.
    /// `None` covers both "nobody connected" and "the handshake failed"; a
    /// failed client socket is closed and the listener stays usable.
    pub fn accept(&mut self, timeout: Duration) -> Option<Connection> {
        match self.try_accept(timeout) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::debug!(error = %e, "accept failed");
                None
            }
        }
    }

    fn try_accept(&mut self, timeout: Duration) -> Result<Option<Connection>> {
        if !wait_ready(&self.listener, Interest::Readable, timeout)? {
            return Ok(None);
        }

        let (stream, peer) = match self.listener.accept() {
            Ok(accepted) => accepted,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };
        tracing::trace!(%peer, "tcp accepted");

        let mut transport = TcpTransport::new(stream)?;
        handshake::perform(&mut transport, self.config.max_handshake_size, timeout)?;
        tracing::debug!(%peer, "handshake complete");

        Ok(Some(Connection::new(transport, Role::Server, &self.config)))
    }

    /// Close the listening socket.
    pub fn destroy(self) {}
}

impl Drop for Server {
    fn drop(&mut self) {
        tracing::debug!(addr = ?self.listener.local_addr().ok(), "listener closed");
    }
}

/// Shorthand for [`Server::create`].
pub fn create_server(port: u16) -> Result<Server> {
    Server::create(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpStream;

    fn loopback() -> Server {
        Server::bind("127.0.0.1:0".parse().unwrap(), &Config::default()).unwrap()
    }

    #[test]
    fn accept_times_out_without_clients() {
        let mut server = loopback();
        assert!(server.accept(Duration::from_millis(20)).is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = Config {
            backlog: 0,
            ..Config::default()
        };
        let err = Server::bind("127.0.0.1:0".parse().unwrap(), &config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn bad_handshake_leaves_listener_usable() {
        let mut server = loopback();
        let addr = server.local_addr().unwrap();

        let mut bad = TcpStream::connect(addr).unwrap();
        bad.write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();
        assert!(server.accept(Duration::from_secs(2)).is_none());

        let mut good = TcpStream::connect(addr).unwrap();
        good.write_all(
            b"GET / HTTP/1.1\r\nHost: x\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        )
        .unwrap();
        let conn = server.accept(Duration::from_secs(2)).expect("upgraded");
        assert!(conn.is_open());
        assert!(conn.peer_addr().is_some());
    }
}
