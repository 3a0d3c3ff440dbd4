//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Pool slot
//!     → NetManager::connect (non-blocking connect, owned by the reactor)
//!     → tls.rs TlsFilter installed on the first event of a TLS slot
//!     → connection.rs events (Read, Wrote, Error, InactivityTimeout)
//!     → back into the pool through dispatch
//!
//! Slot States:
//!     Connecting → Active ⇄ Idle → destroyed
//! ```
//!
//! # Design Decisions
//! - The crate performs no socket I/O; the reactor owns sockets and timers
//! - Events are addressed by generation-checked slot ids
//! - TLS is optional and installed per connection from a shared context

pub mod connection;
pub mod location;
pub mod tls;

pub use connection::{Buffers, Connection, NetEvent, NetManager, SlotId};
pub use location::ServerLocation;
pub use tls::{TlsContext, TlsFilter};
