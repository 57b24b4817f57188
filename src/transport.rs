//! Transport abstraction for the connection layer.
//!
//! Implement this trait to run the handshake and the frame state machine over
//! something other than a TCP socket. Every call is blocking but bounded: the
//! connection always calls [`Transport::wait`] before `recv`/`send`.

use crate::socket::Interest;
use std::io;
use std::time::Duration;

/// Blocking, readiness-gated byte transport (e.g. a TCP stream).
pub trait Transport {
    /// Wait until the transport is ready for `interest`.
    /// Returns `Ok(false)` when the timeout elapsed first.
    fn wait(&mut self, interest: Interest, timeout: Duration) -> io::Result<bool>;

    /// Receive into `buf`. `Ok(0)` means the peer closed its side.
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send part of `buf`, returning how many bytes were taken.
    fn send(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Stop sending. Errors are ignored; the transport is going away.
    fn shutdown(&mut self);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn wait(&mut self, interest: Interest, timeout: Duration) -> io::Result<bool> {
        (**self).wait(interest, timeout)
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).recv(buf)
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).send(buf)
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
