//! Shared utilities for pool integration tests.
//!
//! `MockNet` stands in for the reactor: connects always "start" unless told to
//! fail, and every connection reports into a shared `NetLog` so tests can
//! inspect connections even after the pool has destroyed them.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::Mutex;
use std::time::Duration;

use bytes::BytesMut;
use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use txn_client::net::connection::Buffers;
use txn_client::{
    ClientError, Connection, NetEvent, NetManager, Properties, ServerLocation, SlotId, TlsFilter, Transaction,
    TransactionRef, TransactionalClient,
};

/// Observable state of one mock connection.
#[derive(Debug, Default)]
pub struct ConnState {
    pub good: bool,
    pub max_read_ahead: usize,
    pub inactivity_timeout: Option<Duration>,
    pub read_if_overloaded: bool,
    pub nonblocking_connect: bool,
    pub filter_server_name: Option<String>,
    pub fail_filter: bool,
    pub error_msg: Option<String>,
    /// Event raised by the next flush, then cleared.
    pub flush_event: Option<NetEvent>,
    pub flushes: usize,
    pub closes: usize,
    /// `close` is counted but the connection stays up.
    pub ignore_close: bool,
}

pub struct MockConn {
    pub input: BytesMut,
    pub output: BytesMut,
    pub filter: Option<TlsFilter>,
    pub state: Rc<RefCell<ConnState>>,
}

impl Connection for MockConn {
    fn is_good(&self) -> bool {
        self.state.borrow().good
    }

    fn buffers(&mut self) -> Buffers<'_> {
        Buffers {
            input: &mut self.input,
            output: &mut self.output,
        }
    }

    fn set_max_read_ahead(&mut self, bytes: usize) {
        self.state.borrow_mut().max_read_ahead = bytes;
    }

    fn set_inactivity_timeout(&mut self, timeout: Duration) {
        self.state.borrow_mut().inactivity_timeout = Some(timeout);
    }

    fn enable_read_if_overloaded(&mut self) {
        self.state.borrow_mut().read_if_overloaded = true;
    }

    fn set_doing_nonblocking_connect(&mut self) {
        self.state.borrow_mut().nonblocking_connect = true;
    }

    fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    fn set_filter(&mut self, filter: TlsFilter) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_filter {
            return Err(io::Error::other("filter refused"));
        }
        state.filter_server_name = Some(filter.server_name().to_string());
        self.filter = Some(filter);
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        state.good = state.good && state.ignore_close;
        state.closes += 1;
    }

    fn error_msg(&self) -> Option<String> {
        self.state.borrow().error_msg.clone()
    }

    fn start_flush(&mut self) -> Option<NetEvent> {
        let mut state = self.state.borrow_mut();
        state.flushes += 1;
        state.flush_event.take()
    }
}

/// Everything the mock reactor saw.
#[derive(Debug, Default)]
pub struct NetLog {
    pub connects: Vec<ServerLocation>,
    pub added: Vec<SlotId>,
    pub removed: Vec<SlotId>,
    pub conns: Vec<Rc<RefCell<ConnState>>>,
    /// Raw OS error returned by the next connect.
    pub fail_next_connect: Option<i32>,
    /// New connections refuse their TLS filter.
    pub fail_filter: bool,
}

pub struct MockNet {
    pub log: Rc<RefCell<NetLog>>,
    pub now: i64,
}

impl MockNet {
    pub fn new() -> (Self, Rc<RefCell<NetLog>>) {
        let log = Rc::new(RefCell::new(NetLog::default()));
        (
            Self {
                log: log.clone(),
                now: 1_700_000_000,
            },
            log,
        )
    }
}

impl NetManager for MockNet {
    type Conn = MockConn;

    fn connect(&mut self, location: &ServerLocation) -> io::Result<MockConn> {
        let mut log = self.log.borrow_mut();
        log.connects.push(location.clone());
        if let Some(code) = log.fail_next_connect.take() {
            return Err(io::Error::from_raw_os_error(code));
        }
        let state = Rc::new(RefCell::new(ConnState {
            good: true,
            fail_filter: log.fail_filter,
            ..ConnState::default()
        }));
        log.conns.push(state.clone());
        Ok(MockConn {
            input: BytesMut::new(),
            output: BytesMut::new(),
            filter: None,
            state,
        })
    }

    fn add_connection(&mut self, slot: SlotId, _conn: &mut MockConn) {
        self.log.borrow_mut().added.push(slot);
    }

    fn remove_connection(&mut self, slot: SlotId) {
        self.log.borrow_mut().removed.push(slot);
    }

    fn now(&self) -> i64 {
        self.now
    }
}

/// Transaction whose return values are scripted per call.
#[derive(Debug, Default)]
pub struct ScriptedTxn {
    pub request_bytes: Vec<u8>,
    pub request_status: VecDeque<i32>,
    pub response_status: VecDeque<i32>,
    pub requests: usize,
    pub responses: usize,
    pub received: Vec<u8>,
    pub errors: Vec<(i32, Option<String>)>,
}

impl ScriptedTxn {
    /// A transaction that sends `request` and completes on the first
    /// response call.
    pub fn new(request: &str) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            request_bytes: request.as_bytes().to_vec(),
            ..Self::default()
        }))
    }

    pub fn with_responses(request: &str, statuses: &[i32]) -> Rc<RefCell<Self>> {
        let txn = Self::new(request);
        txn.borrow_mut().response_status = statuses.iter().copied().collect();
        txn
    }
}

impl Transaction for ScriptedTxn {
    fn request(&mut self, output: &mut BytesMut, _input: &BytesMut) -> i32 {
        self.requests += 1;
        if self.requests == 1 {
            output.extend_from_slice(&self.request_bytes);
        }
        self.request_status.pop_front().unwrap_or(0)
    }

    fn response(&mut self, input: &mut BytesMut) -> i32 {
        self.responses += 1;
        self.received.extend_from_slice(input);
        input.clear();
        self.response_status.pop_front().unwrap_or(0)
    }

    fn error(&mut self, error: ClientError) {
        self.errors.push((error.code(), error.message()));
    }
}

pub fn txn_ref(txn: &Rc<RefCell<ScriptedTxn>>) -> TransactionRef {
    txn.clone()
}

pub fn props(pairs: &[(&str, &str)]) -> Properties {
    pairs.iter().copied().collect()
}

/// Pool configured for `example.com:8080` under the `client.` prefix.
pub fn plain_client() -> (TransactionalClient<MockNet>, Rc<RefCell<NetLog>>) {
    let (net, log) = MockNet::new();
    let mut client = TransactionalClient::new(net);
    client
        .set_parameters("client.", &props(&[("client.host", "example.com"), ("client.port", "8080")]))
        .unwrap();
    (client, log)
}

/// Submit a transaction on a fresh connection and return its slot.
pub fn start(client: &mut TransactionalClient<MockNet>, txn: &Rc<RefCell<ScriptedTxn>>) -> SlotId {
    client.run(txn_ref(txn));
    client.in_use_slots()[0]
}

/// Drive a slot through write and one read of `reply`.
pub fn exchange(client: &mut TransactionalClient<MockNet>, id: SlotId, reply: &str) {
    client.dispatch(id, NetEvent::Wrote);
    client.connection_mut(id).unwrap().input.extend_from_slice(reply.as_bytes());
    client.dispatch(id, NetEvent::Read);
}

/// Recorder that notes every counter registration with its labels.
#[derive(Debug, Default)]
pub struct CounterCapture {
    counters: Mutex<Vec<(String, String)>>,
}

impl CounterCapture {
    /// Label sets seen for `name`, in call order, as `key=value` joined by `,`.
    pub fn labels(&self, name: &str) -> Vec<String> {
        self.counters
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, labels)| labels.clone())
            .collect()
    }
}

impl Recorder for CounterCapture {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        let labels: Vec<String> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        self.counters
            .lock()
            .unwrap()
            .push((key.name().to_string(), labels.join(",")));
        Counter::noop()
    }

    fn register_gauge(&self, _key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
