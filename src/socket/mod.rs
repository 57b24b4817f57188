//! Socket layer: bounded readiness waits and the blocking send/receive primitives.
//!
//! Every potentially blocking step goes through [`wait_ready`] (or
//! [`Transport::wait`]) with an explicit timeout; a timeout is never an error
//! at this layer, only "nothing happened".

mod tcp;

pub use tcp::TcpTransport;

use crate::error::{Error, Result};
use crate::transport::Transport;
use rustix::event::{poll, PollFd, PollFlags};
use rustix::fd::AsFd;
use rustix::io::Errno;
use std::io;
use std::time::{Duration, Instant};

/// What a readiness wait is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
}

/// Block until `source` is ready for `interest` or `timeout` elapses.
///
/// Hang-up and error conditions count as ready so the following read or write
/// reports them. Interrupted waits resume with the remaining time.
pub fn wait_ready<S: AsFd>(source: &S, interest: Interest, timeout: Duration) -> io::Result<bool> {
    let flags = match interest {
        Interest::Readable => PollFlags::IN,
        Interest::Writable => PollFlags::OUT,
    };
    let deadline = Instant::now().checked_add(timeout);

    loop {
        let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
        let mut fds = [PollFd::new(source, flags)];
        match poll(&mut fds, poll_millis(remaining)) {
            Ok(0) => return Ok(false),
            Ok(_) => return Ok(!fds[0].revents().is_empty()),
            Err(e) if e == Errno::INTR => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

/// Milliseconds for `poll`, rounded up so short waits do not become busy loops.
fn poll_millis(timeout: Duration) -> i32 {
    i32::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(i32::MAX)
}

/// Map an I/O error, keeping timeouts distinguishable from transport failures.
pub(crate) fn io_error(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::TimedOut {
        Error::Timeout
    } else {
        Error::Io(e)
    }
}

fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// Drain `bytes` into the transport, waiting for writability before each chunk.
///
/// Fails with [`Error::Timeout`] if a single wait exceeds `timeout`.
pub fn send_all<T: Transport + ?Sized>(
    transport: &mut T,
    mut bytes: &[u8],
    timeout: Duration,
) -> Result<()> {
    while !bytes.is_empty() {
        if !transport.wait(Interest::Writable, timeout)? {
            return Err(Error::Timeout);
        }
        match transport.send(bytes) {
            Ok(0) => return Err(Error::Io(io::ErrorKind::WriteZero.into())),
            Ok(n) => bytes = &bytes[n..],
            Err(e) if is_transient(&e) => continue,
            Err(e) => return Err(io_error(e)),
        }
    }
    Ok(())
}

/// Wait for readability and receive once, retrying spurious wakeups and
/// interrupted reads until `timeout` runs out.
///
/// `Ok(None)` means nothing arrived in time; a zero-byte read means the peer
/// went away and is reported as [`Error::Closed`].
pub fn recv_some<T: Transport + ?Sized>(
    transport: &mut T,
    buf: &mut [u8],
    timeout: Duration,
) -> Result<Option<usize>> {
    let deadline = Instant::now().checked_add(timeout);
    loop {
        let remaining = deadline.map_or(timeout, |d| d.saturating_duration_since(Instant::now()));
        if !transport.wait(Interest::Readable, remaining)? {
            return Ok(None);
        }
        match transport.recv(buf) {
            Ok(0) => return Err(Error::Closed),
            Ok(n) => return Ok(Some(n)),
            Err(e) if is_transient(&e) => continue,
            Err(e) => return Err(io_error(e)),
        }
    }
}

/// `io::Write` adapter that pushes through [`send_all`], so the frame encoder can
/// stream straight into a transport.
pub(crate) struct Sender<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
    timeout: Duration,
}

impl<'a, T: Transport + ?Sized> Sender<'a, T> {
    pub(crate) fn new(transport: &'a mut T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }
}

impl<T: Transport + ?Sized> io::Write for Sender<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        send_all(&mut *self.transport, buf, self.timeout).map_err(|e| match e {
            Error::Io(e) => e,
            Error::Timeout => io::ErrorKind::TimedOut.into(),
            other => io::Error::other(other.to_string()),
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
