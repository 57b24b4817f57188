//! Events returned by [`Connection::poll_event`](crate::Connection::poll_event).

/// Outcome of one poll.
///
/// Message payloads borrow the connection's receive buffer and are valid until
/// the next call that takes the connection mutably.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event<'a> {
    /// No message this time: timeout, partial frame, or an answered control frame.
    None,

    /// Complete text message. The bytes are not checked for UTF-8.
    Text(&'a [u8]),

    /// Complete binary message.
    Binary(&'a [u8]),

    /// The connection is gone (close frame, peer EOF, protocol violation or
    /// I/O failure) and has been torn down.
    Closed,
}

impl<'a> Event<'a> {
    /// Payload of a text or binary message.
    pub fn payload(&self) -> Option<&'a [u8]> {
        match *self {
            Event::Text(data) | Event::Binary(data) => Some(data),
            Event::None | Event::Closed => None,
        }
    }

    /// Text payload as `&str`, if it is a text message holding valid UTF-8.
    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            Event::Text(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Event::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let text = Event::Text(b"hi");
        assert_eq!(text.payload(), Some(&b"hi"[..]));
        assert_eq!(text.as_text(), Some("hi"));

        let bin = Event::Binary(&[0xff, 0xfe]);
        assert_eq!(bin.as_text(), None);
        assert_eq!(bin.payload(), Some(&[0xff, 0xfe][..]));

        assert!(Event::Closed.is_closed());
        assert_eq!(Event::None.payload(), None);
        assert!(!Event::None.is_closed());
    }

    #[test]
    fn invalid_utf8_text_still_delivered() {
        let ev = Event::Text(&[0xc3, 0x28]);
        assert!(ev.payload().is_some());
        assert_eq!(ev.as_text(), None);
    }
}
