//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! run(transaction)
//!     → idle slot available: move to in-use, synthetic Wrote event
//!     → otherwise: NetManager::connect, new slot at the in-use front
//!
//! reactor event → dispatch(slot, event)
//!     → slot.rs state machine (nested flush events handled inside)
//!     → outermost event only:
//!         unhealthy         → transaction error, slot discarded
//!         transaction done  → slot recycled to the idle front
//!         otherwise         → stays in use
//! ```
//!
//! # Design Decisions
//! - Slots live in an arena (table.rs) addressed by generation-checked ids
//! - A slot is in exactly one of the idle and in-use lists until destroyed
//! - Nothing here retries; every failure is terminal for its transaction

pub mod client;
pub mod slot;
pub mod table;
pub mod transaction;

pub use client::TransactionalClient;
pub use slot::SlotState;
pub use transaction::{Transaction, TransactionRef};
