//! Transactional client pool.
//!
//! # Responsibilities
//! - Apply endpoint, timeout and TLS configuration
//! - Hand transactions to idle connections, or open new ones
//! - Route reactor events to slots and act on their outcome
//! - Tear everything down on `stop` or drop

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::properties::Properties;
use crate::config::schema::PoolConfig;
use crate::error::{ClientError, ConfigError};
use crate::net::connection::{Connection, NetEvent, NetManager, SlotId};
use crate::net::location::ServerLocation;
use crate::net::tls::TlsContext;
use crate::observability::metrics;
use crate::pool::slot::{Outcome, Slot, SlotState, Transport};
use crate::pool::table::{ListKind, SlotTable};
use crate::pool::transaction::TransactionRef;
use crate::security::verify::PeerNames;

/// Pool of connections to one endpoint, each carrying one transaction at a
/// time.
///
/// The pool is driven entirely by its caller: [`run`](Self::run) submits
/// work and the reactor reports readiness through
/// [`dispatch`](Self::dispatch). Idle connections are reused most recently
/// used first.
pub struct TransactionalClient<N: NetManager> {
    net: N,
    config: PoolConfig,
    /// Published to the TLS verifier of every context this pool builds.
    peer_names: Arc<ArcSwap<PeerNames>>,
    tls_params: Properties,
    tls_context: Option<Arc<TlsContext>>,
    last_error: Option<String>,
    slots: SlotTable<Slot<N::Conn>>,
}

impl<N: NetManager> TransactionalClient<N> {
    /// Create an unconfigured pool. It rejects transactions until
    /// [`set_parameters`](Self::set_parameters) supplies a valid endpoint.
    pub fn new(net: N) -> Self {
        Self {
            net,
            config: PoolConfig::default(),
            peer_names: Arc::new(ArcSwap::from_pointee(PeerNames::default())),
            tls_params: Properties::new(),
            tls_context: None,
            last_error: None,
            slots: SlotTable::new(),
        }
    }

    /// Apply the options found under `prefix` (for example `"client."`).
    ///
    /// Existing connections keep the TLS context they were created with;
    /// only new connections see a rebuilt one.
    pub fn set_parameters(&mut self, prefix: &str, props: &Properties) -> Result<(), ConfigError> {
        let ssl = self.config.apply(prefix, props);
        self.peer_names.store(Arc::new(self.config.peer_names.clone()));

        let mut tls_error = None;
        if ssl != self.tls_params || (self.tls_context.is_none() && !ssl.is_empty()) {
            self.tls_context = None;
            if !ssl.is_empty() {
                match TlsContext::new(&ssl, self.peer_names.clone()) {
                    Ok(context) => self.tls_context = Some(Arc::new(context)),
                    Err(e) => {
                        tracing::error!(prefix = %prefix, error = %e, "Failed to create TLS context");
                        tls_error = Some(e);
                    }
                }
            }
            self.tls_params = ssl;
        }

        let result = if !self.config.location.is_valid() {
            Err(ConfigError::InvalidLocation(self.config.location.to_string()))
        } else if let Some(e) = tls_error {
            Err(e)
        } else {
            Ok(())
        };

        self.last_error = result.as_ref().err().map(|e| e.to_string());
        match &self.last_error {
            Some(error) => tracing::warn!(location = %self.config.location, error = %error, "Pool configuration invalid"),
            None => tracing::debug!(
                location = %self.config.location,
                tls = self.tls_context.is_some(),
                server_name = %self.config.server_name,
                peer_names = self.config.peer_names.len(),
                "Pool configured"
            ),
        }
        result
    }

    /// Submit a transaction.
    ///
    /// Failures are reported through [`Transaction::error`](crate::pool::Transaction::error),
    /// possibly before this call returns.
    pub fn run(&mut self, transaction: TransactionRef) {
        if !self.is_valid() {
            let error = ClientError::InvalidParameters;
            metrics::record_transaction_error(&error);
            transaction.borrow_mut().error(error);
            return;
        }

        if let Some(id) = self.slots.pop_front(ListKind::Idle) {
            self.slots.push_front(ListKind::InUse, id);
            if let Some(slot) = self.slots.get_mut(id) {
                slot.resume(transaction, self.config.timeout());
            }
            tracing::trace!(slot = %id, "Reusing idle connection");
            self.dispatch(id, NetEvent::Wrote);
            return;
        }

        self.connect(transaction);
        self.publish_counts();
    }

    /// Close every connection. Each slot sees one error event, so in-flight
    /// transactions are told they failed. Safe to call repeatedly.
    pub fn stop(&mut self) {
        while let Some(id) = self
            .slots
            .pop_front(ListKind::Idle)
            .or_else(|| self.slots.pop_front(ListKind::InUse))
        {
            self.dispatch(id, NetEvent::Error);
            // The connection ignored close. Drop the slot as is; `destroy`
            // would insist the connection is down.
            if let Some(mut slot) = self.slots.remove(id) {
                tracing::warn!(slot = %id, "Slot survived shutdown error, removing");
                self.net.remove_connection(id);
                if let Some(txn) = slot.transaction.take() {
                    let error = ClientError::Network("network error".to_string());
                    metrics::record_transaction_error(&error);
                    txn.borrow_mut().error(error);
                }
                slot.conn.close();
                metrics::record_discarded();
            }
        }
        self.publish_counts();
    }

    /// Deliver a reactor event to a slot.
    ///
    /// Events for slots that no longer exist are ignored.
    pub fn dispatch(&mut self, id: SlotId, event: NetEvent) {
        let idle_timeout = self.config.idle_timeout();
        let Some(slot) = self.slots.get_mut(id) else {
            tracing::debug!(slot = %id, event = ?event, "Ignoring event for stale slot");
            return;
        };

        match slot.handle(id, event, idle_timeout) {
            Outcome::Continue => {}
            Outcome::Recycle => self.recycle(id),
            Outcome::Discard => self.discard(id),
        }
        self.publish_counts();
    }

    fn connect(&mut self, transaction: TransactionRef) {
        let location = self.config.location.clone();
        let mut conn = match self.net.connect(&location) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(location = %location, error = %e, "connect to {} failed: {}", location, e);
                metrics::record_connect("failure");
                let error = ClientError::Connect(e);
                metrics::record_transaction_error(&error);
                transaction.borrow_mut().error(error);
                return;
            }
        };
        metrics::record_connect("started");

        conn.enable_read_if_overloaded();
        conn.set_doing_nonblocking_connect();
        conn.set_max_read_ahead(1);
        conn.set_inactivity_timeout(self.config.timeout());

        let transport = match &self.tls_context {
            Some(context) => Transport::Tls {
                context: context.clone(),
                server_name: self.config.tls_server_name().to_string(),
                installed: false,
            },
            None => Transport::Plain,
        };
        let slot = Slot::new(conn, location, transport, transaction, self.net.now());
        let tls = slot.is_tls();
        let id = self.slots.insert(slot);
        self.slots.push_front(ListKind::InUse, id);
        if let Some(slot) = self.slots.get_mut(id) {
            self.net.add_connection(id, &mut slot.conn);
        }
        tracing::debug!(slot = %id, location = %self.config.location, tls, "Connecting");
    }

    fn recycle(&mut self, id: SlotId) {
        self.slots.unlink(id);
        self.slots.push_front(ListKind::Idle, id);
        metrics::record_recycled();
        tracing::debug!(slot = %id, idle = self.slots.len(ListKind::Idle), "Connection idle");
    }

    fn discard(&mut self, id: SlotId) {
        self.net.remove_connection(id);
        if let Some(slot) = self.slots.remove(id) {
            let age = self.net.now() - slot.created_at;
            tracing::debug!(slot = %id, location = %slot.location, age_secs = age, "Connection discarded");
            slot.destroy();
            metrics::record_discarded();
        }
    }

    fn publish_counts(&self) {
        metrics::record_slot_counts(self.idle_count(), self.in_use_count());
    }

    /// Whether the last configuration produced a usable pool.
    pub fn is_valid(&self) -> bool {
        self.config.location.is_valid() && (self.tls_params.is_empty() || self.tls_context.is_some())
    }

    /// Error text of the last failed configuration.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn idle_count(&self) -> usize {
        self.slots.len(ListKind::Idle)
    }

    pub fn in_use_count(&self) -> usize {
        self.slots.len(ListKind::InUse)
    }

    /// Idle slots, next to be reused first.
    pub fn idle_slots(&self) -> Vec<SlotId> {
        self.slots.ids(ListKind::Idle)
    }

    /// In-use slots, most recently started first.
    pub fn in_use_slots(&self) -> Vec<SlotId> {
        self.slots.ids(ListKind::InUse)
    }

    pub fn slot_state(&self, id: SlotId) -> Option<SlotState> {
        self.slots.get(id).map(|slot| slot.state)
    }

    pub fn connection(&self, id: SlotId) -> Option<&N::Conn> {
        self.slots.get(id).map(|slot| &slot.conn)
    }

    pub fn connection_mut(&mut self, id: SlotId) -> Option<&mut N::Conn> {
        self.slots.get_mut(id).map(|slot| &mut slot.conn)
    }

    pub fn location(&self) -> &ServerLocation {
        &self.config.location
    }

    /// Peer identities the TLS verifier currently accepts.
    pub fn peer_names(&self) -> Arc<PeerNames> {
        self.peer_names.load_full()
    }

    pub fn server_name(&self) -> &str {
        &self.config.server_name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// TLS context new connections are created with.
    pub fn tls_context(&self) -> Option<&Arc<TlsContext>> {
        self.tls_context.as_ref()
    }

    pub fn net_manager(&self) -> &N {
        &self.net
    }

    pub fn net_manager_mut(&mut self) -> &mut N {
        &mut self.net
    }
}

impl<N: NetManager> Drop for TransactionalClient<N> {
    fn drop(&mut self) {
        self.stop();
    }
}
