//! Connection and reactor contracts.
//!
//! # Responsibilities
//! - Name the events a reactor delivers to a slot
//! - Define what the pool needs from a connection object
//! - Define what the pool needs from the reactor (connect, register, clock)
//!
//! The pool never performs I/O itself; an embedding event loop implements
//! [`NetManager`] and [`Connection`] on top of its sockets and feeds readiness
//! back through
//! [`TransactionalClient::dispatch`](crate::pool::TransactionalClient::dispatch).

use std::fmt;
use std::io;
use std::time::Duration;

use bytes::BytesMut;

use crate::net::location::ServerLocation;
use crate::net::tls::TlsFilter;

/// Identifier of a pool slot, handed to the reactor at registration.
///
/// Carries a generation so events for a destroyed slot are never delivered
/// to a newer slot reusing the same arena index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl SlotId {
    /// Arena index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Arena generation of the index when this id was issued.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}.{}", self.index, self.generation)
    }
}

/// Event delivered by the reactor to a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetEvent {
    /// Input is available (at least the read-ahead threshold).
    Read,
    /// Output was flushed; more can be written. Also the first event after a
    /// non-blocking connect completes.
    Wrote,
    /// Connection error or end of stream.
    Error,
    /// No activity for the configured inactivity timeout.
    InactivityTimeout,
}

/// Input and output buffers of a connection, borrowed together.
pub struct Buffers<'a> {
    pub input: &'a mut BytesMut,
    pub output: &'a mut BytesMut,
}

/// A non-blocking connection owned by exactly one slot.
pub trait Connection {
    /// Whether the connection is still open and error free.
    fn is_good(&self) -> bool;

    /// Input (received) and output (pending send) buffers.
    fn buffers(&mut self) -> Buffers<'_>;

    /// Minimum number of buffered bytes before the next [`NetEvent::Read`].
    fn set_max_read_ahead(&mut self, bytes: usize);

    fn set_inactivity_timeout(&mut self, timeout: Duration);

    /// Keep reading even when the reactor considers itself overloaded.
    fn enable_read_if_overloaded(&mut self);

    /// The socket has a connect in flight; the first writable event means
    /// the connect completed.
    fn set_doing_nonblocking_connect(&mut self);

    /// Whether a TLS filter is installed.
    fn has_filter(&self) -> bool;

    /// Install a TLS filter; all further bytes pass through it.
    fn set_filter(&mut self, filter: TlsFilter) -> io::Result<()>;

    /// Force close. Afterwards `is_good` is false.
    fn close(&mut self);

    /// Text of the last error seen on the connection, if any.
    fn error_msg(&self) -> Option<String>;

    /// Start sending the output buffer.
    ///
    /// A flush that fails or completes synchronously may raise an event right
    /// away; it is returned here and handled nested inside the current event.
    fn start_flush(&mut self) -> Option<NetEvent>;

    fn input(&mut self) -> &mut BytesMut {
        self.buffers().input
    }

    fn output(&mut self) -> &mut BytesMut {
        self.buffers().output
    }
}

/// The reactor side of the pool.
pub trait NetManager {
    type Conn: Connection;

    /// Create a socket and issue a non-blocking connect.
    ///
    /// A connect that is still in progress is a success. An `Err` means the
    /// connect failed immediately and no connection object exists.
    fn connect(&mut self, location: &ServerLocation) -> io::Result<Self::Conn>;

    /// Start polling `conn` and delivering its events for `slot`.
    fn add_connection(&mut self, slot: SlotId, conn: &mut Self::Conn);

    /// Stop delivering events for `slot`. Called when the slot is destroyed.
    fn remove_connection(&mut self, slot: SlotId);

    /// Current time, seconds since the Unix epoch.
    fn now(&self) -> i64;
}
