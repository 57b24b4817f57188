//! Server tunables.
//!
//! The library never reads a config file; hosts build a [`Config`] in code or
//! deserialize it from whatever format they already use.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: i32 = 16;

/// Upper bound on the HTTP upgrade request.
pub const DEFAULT_MAX_HANDSHAKE_SIZE: usize = 8 * 1024;

/// Largest payload a single outgoing frame may carry (64 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

/// Minimum free space made available in the receive buffer before every read.
pub const DEFAULT_READ_INCREMENT: usize = 4 * 1024;

/// Normal closure status code sent on teardown.
pub const DEFAULT_CLOSE_CODE: u16 = 1000;

/// Server and connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen backlog.
    pub backlog: i32,

    /// Maximum size of the upgrade request, terminator included.
    pub max_handshake_size: usize,

    /// Maximum outgoing frame payload.
    pub max_frame_size: usize,

    /// Free bytes guaranteed in the receive buffer before each read.
    pub read_increment: usize,

    /// Bound on each readiness wait while writing a frame.
    #[serde(with = "duration_micros")]
    pub send_timeout: Duration,

    /// Status code carried by the close frame sent on teardown.
    pub close_code: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backlog: DEFAULT_BACKLOG,
            max_handshake_size: DEFAULT_MAX_HANDSHAKE_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_increment: DEFAULT_READ_INCREMENT,
            send_timeout: Duration::from_secs(1),
            close_code: DEFAULT_CLOSE_CODE,
        }
    }
}

impl Config {
    /// Reject settings that would make the server unusable.
    pub fn validate(&self) -> Result<()> {
        if self.backlog <= 0 {
            return Err(Error::Config("backlog must be positive".into()));
        }
        // Smallest request that can carry the terminator.
        if self.max_handshake_size < 4 {
            return Err(Error::Config("max_handshake_size too small".into()));
        }
        if self.read_increment == 0 {
            return Err(Error::Config("read_increment must be non-zero".into()));
        }
        if self.send_timeout.is_zero() {
            return Err(Error::Config("send_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Timeouts are expressed in microseconds on the wire, matching the poll API.
mod duration_micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_micros(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.backlog, 16);
        assert_eq!(config.max_handshake_size, 8192);
        assert_eq!(config.max_frame_size, 64 * 1024 * 1024);
        assert_eq!(config.read_increment, 4096);
        assert_eq!(config.close_code, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_values() {
        let config = Config {
            backlog: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config {
            read_increment: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            send_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserialize_partial_config() {
        let config: Config =
            serde_json::from_str(r#"{ "backlog": 64, "send_timeout": 250000 }"#).unwrap();
        assert_eq!(config.backlog, 64);
        assert_eq!(config.send_timeout, Duration::from_millis(250));
        assert_eq!(config.max_handshake_size, DEFAULT_MAX_HANDSHAKE_SIZE);
    }
}
