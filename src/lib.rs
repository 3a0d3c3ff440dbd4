//! Pooled, event-driven transactional client.
//!
//! A [`TransactionalClient`] keeps a pool of non-blocking connections to one
//! endpoint, optionally secured with TLS, and runs request/response
//! [`Transaction`]s over them. Socket I/O and timers belong to the embedding
//! reactor, which implements [`NetManager`] and feeds events back through
//! [`TransactionalClient::dispatch`].

pub mod config;
pub mod error;
pub mod net;
pub mod observability;
pub mod pool;
pub mod security;

pub use config::{PoolConfig, Properties};
pub use error::{ClientError, ConfigError};
pub use net::{Connection, NetEvent, NetManager, ServerLocation, SlotId, TlsContext, TlsFilter};
pub use pool::{SlotState, Transaction, TransactionRef, TransactionalClient};
pub use security::{PeerNames, PeerVerifier};
