//! Error types.
//!
//! [`ClientError`] is what a [`Transaction`](crate::pool::Transaction) is told
//! when its exchange fails. [`ConfigError`] is what configuration returns.

use std::io;

use thiserror::Error;

/// `EIO`.
const EIO: i32 = 5;
/// `EINVAL`.
const EINVAL: i32 = 22;
/// `ETIMEDOUT`.
const ETIMEDOUT: i32 = 110;

/// Terminal failure of a transaction.
///
/// Every variant also ends the connection that carried the transaction; the
/// pool never retries.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The pool configuration is invalid; no connection was attempted.
    #[error("invalid parameters")]
    InvalidParameters,

    /// The non-blocking connect failed immediately.
    #[error("{0}")]
    Connect(#[source] io::Error),

    /// The connection was inactive for longer than the configured timeout.
    #[error("network timeout")]
    Timeout,

    /// The connection failed or was closed: I/O error, protocol error reported
    /// by the transaction, premature EOF, or TLS handshake failure.
    #[error("{0}")]
    Network(String),
}

impl ClientError {
    /// Negative errno-style code, as delivered to transactions.
    pub fn code(&self) -> i32 {
        match self {
            ClientError::InvalidParameters => -EINVAL,
            ClientError::Connect(e) => -e.raw_os_error().filter(|&c| c > 0).unwrap_or(EIO),
            ClientError::Timeout => -ETIMEDOUT,
            ClientError::Network(_) => -EIO,
        }
    }

    /// Human readable detail. Timeouts carry none.
    pub fn message(&self) -> Option<String> {
        match self {
            ClientError::Timeout => None,
            other => Some(other.to_string()),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::InvalidParameters => "invalid_parameters",
            ClientError::Connect(_) => "connect",
            ClientError::Timeout => "timeout",
            ClientError::Network(_) => "network",
        }
    }
}

/// Errors produced while loading or applying configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The endpoint is missing a host name or has a zero port.
    #[error("invalid server location: {0}")]
    InvalidLocation(String),

    /// The TLS context could not be built from the `ssl.*` parameters.
    #[error("TLS context: {0}")]
    Tls(String),

    /// Reading a configuration file failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A configuration file is not valid TOML.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_errno_convention() {
        assert_eq!(ClientError::InvalidParameters.code(), -22);
        assert_eq!(ClientError::Timeout.code(), -110);
        assert_eq!(ClientError::Network("reset".into()).code(), -5);
        let refused = io::Error::from_raw_os_error(111);
        assert_eq!(ClientError::Connect(refused).code(), -111);
        let other = io::Error::new(io::ErrorKind::Other, "no route");
        assert_eq!(ClientError::Connect(other).code(), -5);
    }

    #[test]
    fn timeout_has_no_message() {
        assert_eq!(ClientError::Timeout.message(), None);
        assert_eq!(
            ClientError::Network("peer reset".into()).message().as_deref(),
            Some("peer reset")
        );
        assert_eq!(
            ClientError::InvalidParameters.message().as_deref(),
            Some("invalid parameters")
        );
    }
}
