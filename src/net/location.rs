//! Remote endpoint address.

use std::fmt;

/// Host name and port of the single endpoint a pool talks to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerLocation {
    pub hostname: String,
    pub port: u16,
}

impl ServerLocation {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
        }
    }

    /// A location is usable once it names a host and a non-zero port.
    pub fn is_valid(&self) -> bool {
        !self.hostname.is_empty() && self.port > 0
    }
}

impl Default for ServerLocation {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port: 443,
        }
    }
}

impl fmt::Display for ServerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hostname, self.port)
    }
}
