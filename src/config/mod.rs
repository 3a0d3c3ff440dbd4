//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! properties file (TOML)
//!     → loader.rs (parse & flatten to dotted keys)
//!     → Properties (flat key/value map)
//!     → TransactionalClient::set_parameters(prefix, &props)
//!         → schema.rs (PoolConfig::apply: endpoint, timeouts, TLS naming)
//!         → ssl.* sub-namespace → net::tls::TlsContext (rebuilt only on change)
//!
//! On reload:
//!     watcher.rs detects change
//!     → loader.rs loads new properties
//!     → ScopedReload keeps the pool's prefix, drops unchanged or empty sets
//!     → sent to the event loop owning the pool
//!     → set_parameters re-applied there
//! ```
//!
//! # Design Decisions
//! - Absent options keep their current value
//! - The TLS context is only rebuilt when the ssl.* set actually changes
//! - Invalid configuration is recorded, and every later submission fails fast

pub mod loader;
pub mod properties;
pub mod schema;
pub mod watcher;

pub use properties::Properties;
pub use schema::PoolConfig;
