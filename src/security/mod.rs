//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! TLS handshake (rustls, inside the connection's record layer)
//!     → verify.rs PeerNameVerifier
//!         → ChainValidator (webpki chain verdict)
//!         → PeerVerifier per certificate, leaf last
//!             → leaf identity checked against the live PeerNames set
//!     → accepted: handshake continues
//!     → rejected: handshake fails, connection errors, transaction gets an I/O error
//! ```

pub mod verify;

pub use verify::{PeerNames, PeerVerifier};
