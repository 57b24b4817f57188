//! HTTP/1.1 upgrade handshake (server side).
//!
//! Reads the raw request up to the blank line, pulls `Sec-WebSocket-Key` out of
//! the header block and answers with `101 Switching Protocols`.

mod b64;
mod sha1;

pub use b64::{encode_into, required_capacity};
pub use sha1::{Sha1, DIGEST_LEN};

use crate::error::{Error, HandshakeError, Result};
use crate::socket::{recv_some, send_all};
use crate::transport::Transport;
use std::time::Duration;

/// GUID appended to the client key before hashing (RFC 6455, section 1.3).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Longest key accepted: key and GUID together must stay under 256 bytes.
pub const MAX_KEY_LEN: usize = 255 - WS_GUID.len();

const HEADER_END: &[u8] = b"\r\n\r\n";

const KEY_HEADER: &str = "Sec-WebSocket-Key";

/// Compute the `Sec-WebSocket-Accept` value: base64(SHA-1(key ++ GUID)).
pub fn accept_key(key: &[u8]) -> std::result::Result<String, HandshakeError> {
    if key.len() > MAX_KEY_LEN {
        return Err(HandshakeError::KeyTooLong { len: key.len() });
    }

    let mut hasher = Sha1::new();
    hasher.update(key);
    hasher.update(WS_GUID.as_bytes());
    let digest = hasher.finalize();

    let mut out = [0u8; required_capacity(DIGEST_LEN)];
    let n = encode_into(&digest, &mut out).ok_or(HandshakeError::Encode)?;
    // The base64 alphabet is ASCII.
    String::from_utf8(out[..n].to_vec()).map_err(|_| HandshakeError::Encode)
}

/// Find a header value by ASCII case-insensitive name.
///
/// Lines are `\r\n` delimited and the block ends at the first empty line.
/// Whitespace between the name and the colon is ignored, as is leading
/// whitespace in the value.
pub fn header_value<'a>(request: &'a [u8], name: &str) -> Option<&'a [u8]> {
    let mut rest = request;
    while let Some(eol) = find(rest, b"\r\n") {
        let line = &rest[..eol];
        if line.is_empty() {
            break;
        }
        rest = &rest[eol + 2..];

        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let header = trim_end(&line[..colon]);
        if header.eq_ignore_ascii_case(name.as_bytes()) {
            return Some(trim_start(&line[colon + 1..]));
        }
    }
    None
}

/// The literal `101` response for an accept value.
pub fn response(accept: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    )
}

/// Read the upgrade request from a fresh transport, bounded by `max_size` bytes.
///
/// Each receive is gated by a readiness wait of `timeout`; running out of time
/// or the peer closing first both fail the handshake.
pub fn read_request<T: Transport + ?Sized>(
    transport: &mut T,
    max_size: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let mut request = vec![0u8; max_size];
    let mut used = 0;

    loop {
        if used >= max_size {
            return Err(HandshakeError::RequestTooLarge { max: max_size }.into());
        }
        let n = match recv_some(transport, &mut request[used..], timeout) {
            Ok(Some(n)) => n,
            Ok(None) | Err(Error::Closed) => return Err(HandshakeError::Incomplete.into()),
            Err(e) => return Err(e),
        };

        // The terminator may straddle two reads.
        let search_from = used.saturating_sub(HEADER_END.len() - 1);
        used += n;
        if find(&request[search_from..used], HEADER_END).is_some() {
            request.truncate(used);
            return Ok(request);
        }
    }
}

/// Run the full server handshake on `transport`.
pub fn perform<T: Transport + ?Sized>(
    transport: &mut T,
    max_size: usize,
    timeout: Duration,
) -> Result<()> {
    let request = read_request(transport, max_size, timeout)?;
    let key = header_value(&request, KEY_HEADER).ok_or(HandshakeError::MissingKey)?;
    let accept = accept_key(key)?;

    tracing::trace!(accept = %accept, "upgrade request accepted");
    send_all(transport, response(&accept).as_bytes(), timeout)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn trim_start(mut s: &[u8]) -> &[u8] {
    while let [b' ' | b'\t', rest @ ..] = s {
        s = rest;
    }
    s
}

fn trim_end(mut s: &[u8]) -> &[u8] {
    while let [rest @ .., b' ' | b'\t'] = s {
        s = rest;
    }
    s
}
