//! Pool metrics.
//!
//! # Metrics
//! - `txn_client_connects_total` (counter): connect attempts by `outcome` (`started`, `failure`)
//! - `txn_client_transaction_errors_total` (counter): failed transactions by `kind`
//! - `txn_client_recycled_total` (counter): slots returned to the idle list
//! - `txn_client_discarded_total` (counter): slots destroyed
//! - `txn_client_idle_slots` (gauge): idle list length
//! - `txn_client_in_use_slots` (gauge): in-use list length
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op. Installing an exporter is left to the
//! embedding process.

use metrics::{counter, gauge};

use crate::error::ClientError;

pub fn record_connect(outcome: &'static str) {
    counter!("txn_client_connects_total", "outcome" => outcome).increment(1);
}

pub fn record_transaction_error(error: &ClientError) {
    counter!("txn_client_transaction_errors_total", "kind" => error.kind()).increment(1);
}

pub fn record_recycled() {
    counter!("txn_client_recycled_total").increment(1);
}

pub fn record_discarded() {
    counter!("txn_client_discarded_total").increment(1);
}

pub fn record_slot_counts(idle: usize, in_use: usize) {
    gauge!("txn_client_idle_slots").set(idle as f64);
    gauge!("txn_client_in_use_slots").set(in_use as f64);
}
