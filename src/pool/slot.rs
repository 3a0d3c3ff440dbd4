//! Per-connection state machine.
//!
//! A slot owns one connection and at most one transaction. Events are
//! handled with an explicit nesting depth: a flush started while handling an
//! event may raise another event synchronously, which is handled inside the
//! outer one. Only the outermost handler decides whether the slot stays in
//! use, goes idle or is discarded.

use std::sync::Arc;
use std::time::Duration;

use crate::error::ClientError;
use crate::net::connection::{Connection, NetEvent, SlotId};
use crate::net::location::ServerLocation;
use crate::net::tls::{TlsContext, TlsFilter};
use crate::pool::transaction::TransactionRef;

/// Lifecycle state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Non-blocking connect issued, no event seen yet.
    Connecting,
    /// Working on a transaction.
    Active,
    /// Parked in the idle list.
    Idle,
}

/// How bytes reach the wire. TLS slots install their filter on the first
/// event, using the context and server name captured at creation.
pub(crate) enum Transport {
    Plain,
    Tls {
        context: Arc<TlsContext>,
        server_name: String,
        installed: bool,
    },
}

/// What the pool must do with a slot after an outermost event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Continue,
    Recycle,
    Discard,
}

pub(crate) struct Slot<C> {
    pub(crate) conn: C,
    pub(crate) location: ServerLocation,
    pub(crate) transport: Transport,
    pub(crate) transaction: Option<TransactionRef>,
    pub(crate) state: SlotState,
    pub(crate) created_at: i64,
    depth: u32,
}

impl<C: Connection> Slot<C> {
    pub(crate) fn new(
        conn: C,
        location: ServerLocation,
        transport: Transport,
        transaction: TransactionRef,
        created_at: i64,
    ) -> Self {
        Self {
            conn,
            location,
            transport,
            transaction: Some(transaction),
            state: SlotState::Connecting,
            created_at,
            depth: 0,
        }
    }

    pub(crate) fn is_tls(&self) -> bool {
        matches!(self.transport, Transport::Tls { .. })
    }

    /// Hand an idle slot a new transaction. The caller follows up with a
    /// synthetic [`NetEvent::Wrote`] to start the request.
    pub(crate) fn resume(&mut self, transaction: TransactionRef, timeout: Duration) {
        debug_assert!(self.transaction.is_none(), "resuming a busy slot");
        self.transaction = Some(transaction);
        self.state = SlotState::Active;
        self.conn.set_inactivity_timeout(timeout);
    }

    /// Handle one event, including any event raised by the flush it starts.
    pub(crate) fn handle(&mut self, id: SlotId, event: NetEvent, idle_timeout: Duration) -> Outcome {
        self.depth += 1;
        let event = self.install_filter(id, event);
        self.on_event(event);

        let outcome = if self.depth == 1 {
            if let Some(nested) = self.conn.start_flush() {
                tracing::trace!(slot = %id, event = ?nested, "Nested event from flush");
                self.handle(id, nested, idle_timeout);
            }
            self.finalize(event, idle_timeout)
        } else {
            Outcome::Continue
        };
        self.depth -= 1;
        outcome
    }

    fn install_filter(&mut self, id: SlotId, event: NetEvent) -> NetEvent {
        let Transport::Tls {
            context,
            server_name,
            installed,
        } = &mut self.transport
        else {
            return event;
        };
        if *installed || self.conn.has_filter() {
            *installed = true;
            return event;
        }

        match TlsFilter::new(&**context, server_name.as_str()).and_then(|filter| self.conn.set_filter(filter)) {
            Ok(()) => {
                *installed = true;
                tracing::debug!(slot = %id, server_name = %server_name, "TLS filter installed");
                event
            }
            Err(e) => {
                tracing::error!(location = %self.location, error = %e, "connect to {} error: {}", self.location, e);
                self.conn.close();
                NetEvent::Error
            }
        }
    }

    fn on_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Read => {
                let Some(txn) = self.transaction.clone() else {
                    // Unsolicited input on an idle connection.
                    self.conn.close();
                    return;
                };
                self.state = SlotState::Active;
                let status = txn.borrow_mut().response(self.conn.input());
                if status < 0 {
                    self.conn.close();
                } else if status > 0 {
                    self.conn.set_max_read_ahead(status as usize);
                } else {
                    self.transaction = None;
                }
            }
            NetEvent::Wrote => {
                let Some(txn) = self.transaction.clone() else {
                    return;
                };
                self.state = SlotState::Active;
                let buffers = self.conn.buffers();
                if txn.borrow_mut().request(buffers.output, buffers.input) < 0 {
                    self.conn.close();
                }
            }
            NetEvent::Error => {
                if self.conn.is_good() {
                    // End of stream: the response may be delimited by close.
                    if let Some(txn) = self.transaction.clone() {
                        if txn.borrow_mut().response(self.conn.input()) == 0 {
                            self.transaction = None;
                        }
                    }
                }
                self.conn.close();
                self.conn.input().clear();
            }
            NetEvent::InactivityTimeout => {
                self.conn.close();
                self.conn.input().clear();
            }
        }
    }

    fn finalize(&mut self, event: NetEvent, idle_timeout: Duration) -> Outcome {
        if !self.conn.is_good() {
            if let Some(txn) = self.transaction.take() {
                let error = if event == NetEvent::InactivityTimeout {
                    ClientError::Timeout
                } else {
                    ClientError::Network(self.conn.error_msg().unwrap_or_else(|| "network error".to_string()))
                };
                crate::observability::metrics::record_transaction_error(&error);
                txn.borrow_mut().error(error);
            }
            self.conn.close();
            return Outcome::Discard;
        }

        if self.transaction.is_none() {
            // Already parked; a stray event must not move it in the idle list.
            if self.state == SlotState::Idle {
                return Outcome::Continue;
            }
            self.conn.set_max_read_ahead(1);
            self.conn.set_inactivity_timeout(idle_timeout);
            let buffers = self.conn.buffers();
            buffers.input.clear();
            buffers.output.clear();
            self.state = SlotState::Idle;
            return Outcome::Recycle;
        }

        Outcome::Continue
    }

    /// Tear down a slot that has left both lists. Anything still attached is
    /// a bookkeeping bug.
    pub(crate) fn destroy(mut self) {
        debug_assert_eq!(self.depth, 0, "slot destroyed while handling an event");
        debug_assert!(self.transaction.is_none(), "slot destroyed with a transaction");
        debug_assert!(!self.conn.is_good(), "slot destroyed with a live connection");
        self.transaction = None;
        self.conn.close();
    }
}
