//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pool / slot / verifier
//!     → tracing events (connect failures, filter install, peer verification,
//!       recycle and discard at debug)
//!     → metrics.rs counters and gauges through the `metrics` facade
//!
//! Consumers:
//!     → logging.rs fmt subscriber, when the embedding process installs it
//!     → whatever metrics recorder the embedding process installs
//! ```

pub mod logging;
pub mod metrics;
