//! A [`Socket`] represents one namespace multiplexed over the client
//! connection.
//!
//! It owns the listener table, the outstanding-ack table and the pre-connect
//! emit queue. Listener dispatch snapshots the handler under a short lock and
//! invokes it after release, so user code never runs under an internal mutex
//! and deregistering a listener never cancels an in-flight call.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime};

use tokio::task::AbortHandle;

use crate::ack::{next_ack_id, AckCallback, AckEntry};
use crate::engine::Engine;
use crate::errors::AckError;
use crate::metrics::ConnectionMetrics;
use crate::packet::{Packet, PacketData};
use crate::value::Value;

/// How long a namespace waits for the server `CONNECT` response.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);
/// Grace period between sending `DISCONNECT` and tearing the namespace down.
const CLOSE_GRACE: Duration = Duration::from_secs(3);

static NULL_VALUE: Value = Value::Null;

/// An inbound event handed to listeners.
///
/// A listener that wants to acknowledge the event fills
/// [`put_ack_message`](Event::put_ack_message); the reply is sent once every
/// listener has run, iff the sender asked for an ack and the list is
/// non-empty.
pub struct Event {
    nsp: String,
    name: String,
    args: Vec<Value>,
    need_ack: bool,
    ack_message: Vec<Value>,
}

impl Event {
    /// The namespace the event arrived on.
    pub fn nsp(&self) -> &str {
        &self.nsp
    }

    /// The event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All event arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The first argument, or null when the event carried none.
    pub fn message(&self) -> &Value {
        self.args.first().unwrap_or(&NULL_VALUE)
    }

    /// Whether the sender requested an acknowledgement.
    pub fn need_ack(&self) -> bool {
        self.need_ack
    }

    /// Set the acknowledgement payload. Ignored when no ack was requested.
    pub fn put_ack_message(&mut self, ack_message: Vec<Value>) {
        if self.need_ack {
            self.ack_message = ack_message;
        }
    }
}

pub(crate) type Listener = Arc<dyn Fn(&mut Event) + Send + Sync>;
pub(crate) type ErrorListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// A client socket bound to one namespace.
pub struct Socket {
    engine: Weak<Engine>,
    nsp: String,
    auth: Option<Value>,

    connected: AtomicBool,
    closed: AtomicBool,

    acks: Mutex<HashMap<u32, AckEntry>>,
    bindings: Mutex<HashMap<String, Listener>>,
    any_listener: Mutex<Option<Listener>>,
    error_listener: Mutex<Option<ErrorListener>>,

    /// FIFO of packets emitted before the namespace was connected
    queue: Mutex<VecDeque<Packet>>,
    /// Doubles as the connect timer and the close grace timer
    connection_timer: Mutex<Option<AbortHandle>>,

    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    connected_at: Mutex<Option<SystemTime>>,
}

impl Socket {
    pub(crate) fn new(engine: Weak<Engine>, nsp: String, auth: Option<Value>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            nsp,
            auth,
            connected: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            acks: Mutex::new(HashMap::new()),
            bindings: Mutex::new(HashMap::new()),
            any_listener: Mutex::new(None),
            error_listener: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
            connection_timer: Mutex::new(None),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            connected_at: Mutex::new(None),
        })
    }

    /// The namespace this socket is bound to.
    pub fn namespace(&self) -> &str {
        &self.nsp
    }

    /// Whether the namespace handshake has completed.
    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    // ==== listener registration ====

    /// Register a listener for the given event name, replacing any previous
    /// one.
    pub fn on(
        &self,
        event: impl Into<String>,
        listener: impl Fn(&mut Event) + Send + Sync + 'static,
    ) {
        self.bindings
            .lock()
            .unwrap()
            .insert(event.into(), Arc::new(listener));
    }

    /// Register a catch-all listener invoked for every inbound event.
    pub fn on_any(&self, listener: impl Fn(&mut Event) + Send + Sync + 'static) {
        *self.any_listener.lock().unwrap() = Some(Arc::new(listener));
    }

    /// Register a handler that can acknowledge the event by pushing values
    /// into the provided list. The reply is sent iff the sender requested an
    /// ack and the handler pushed at least one value.
    pub fn on_with_ack(
        &self,
        event: impl Into<String>,
        handler: impl Fn(&Value, &mut Vec<Value>) + Send + Sync + 'static,
    ) {
        self.on(event, move |ev| {
            let mut ack_message = Vec::new();
            handler(ev.message(), &mut ack_message);
            if ev.need_ack() && !ack_message.is_empty() {
                ev.put_ack_message(ack_message);
            }
        });
    }

    /// The older handler form: the returned boolean becomes a one-element ack
    /// payload.
    pub fn on_with_simple_ack(
        &self,
        event: impl Into<String>,
        handler: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) {
        self.on_with_ack(event, move |message, ack_message| {
            ack_message.push(Value::Bool(handler(message)));
        });
    }

    /// Remove the listener for the given event name.
    pub fn off(&self, event: &str) {
        self.bindings.lock().unwrap().remove(event);
    }

    /// Remove every named listener and the catch-all listener.
    pub fn off_all(&self) {
        self.bindings.lock().unwrap().clear();
        *self.any_listener.lock().unwrap() = None;
    }

    /// Register the listener for `CONNECT_ERROR` payloads on this namespace.
    pub fn on_error(&self, listener: impl Fn(&Value) + Send + Sync + 'static) {
        *self.error_listener.lock().unwrap() = Some(Arc::new(listener));
    }

    /// Remove the error listener.
    pub fn off_error(&self) {
        *self.error_listener.lock().unwrap() = None;
    }

    // ==== emitting ====

    /// Emit an event with the given arguments, without acknowledgement.
    pub fn emit(&self, event: &str, args: Vec<Value>) {
        if self.closed() {
            return;
        }
        let payload = Value::event_payload(event, args);
        self.send_packet(Packet::event(self.nsp.clone(), payload));
    }

    /// Emit an event and invoke `ack` with the acknowledgement arguments once
    /// the server replies.
    pub fn emit_with_ack(
        self: &Arc<Self>,
        event: &str,
        args: Vec<Value>,
        ack: impl FnOnce(Vec<Value>) + Send + 'static,
    ) {
        self.emit_inner(event, args, Box::new(ack), None);
    }

    /// Emit an event with an acknowledgement deadline.
    ///
    /// Exactly one of `ack` and `on_timeout` is invoked, never both: the ack
    /// table entry is removed atomically by whichever side fires first, and a
    /// server reply arriving after the timeout is silently discarded.
    pub fn emit_with_ack_timeout(
        self: &Arc<Self>,
        event: &str,
        args: Vec<Value>,
        ack: impl FnOnce(Vec<Value>) + Send + 'static,
        timeout: Duration,
        on_timeout: impl FnOnce() + Send + 'static,
    ) {
        self.emit_inner(event, args, Box::new(ack), Some((timeout, Box::new(on_timeout))));
    }

    /// Emit an event and await the acknowledgement.
    ///
    /// Resolves with the ack argument list, or fails with
    /// [`AckError::Timeout`] when a deadline was given and the server did not
    /// reply in time.
    pub async fn emit_async(
        self: &Arc<Self>,
        event: &str,
        args: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<Vec<Value>, AckError> {
        let (tx, rx) = tokio::sync::oneshot::channel::<Result<Vec<Value>, AckError>>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let ack_tx = tx.clone();
        let ack = move |args: Vec<Value>| {
            if let Some(tx) = ack_tx.lock().unwrap().take() {
                tx.send(Ok(args)).ok();
            }
        };
        match timeout {
            Some(timeout) => {
                let timeout_tx = tx.clone();
                self.emit_with_ack_timeout(event, args, ack, timeout, move || {
                    if let Some(tx) = timeout_tx.lock().unwrap().take() {
                        tx.send(Err(AckError::Timeout)).ok();
                    }
                });
            }
            None => self.emit_with_ack(event, args, ack),
        }
        rx.await.unwrap_or(Err(AckError::Closed))
    }

    fn emit_inner(
        self: &Arc<Self>,
        event: &str,
        args: Vec<Value>,
        ack: AckCallback,
        timeout: Option<(Duration, Box<dyn FnOnce() + Send>)>,
    ) {
        if self.closed() {
            return;
        }
        let payload = Value::event_payload(event, args);
        let mut packet = Packet::event(self.nsp.clone(), payload);

        let id = next_ack_id();
        packet.inner.set_ack_id(id as i64);
        let timer = timeout.map(|(timeout, on_timeout)| self.spawn_ack_timer(id, timeout, on_timeout));
        self.acks
            .lock()
            .unwrap()
            .insert(id, AckEntry { callback: ack, timer });

        self.send_packet(packet);
    }

    fn spawn_ack_timer(
        self: &Arc<Self>,
        id: u32,
        timeout: Duration,
        on_timeout: Box<dyn FnOnce() + Send>,
    ) -> AbortHandle {
        let socket = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            // Removing the entry decides the race against an arriving ack; a
            // reply that shows up later finds nothing and is dropped.
            let entry = socket.acks.lock().unwrap().remove(&id);
            if entry.is_some() {
                on_timeout();
            }
        });
        handle.abort_handle()
    }

    /// Queue the packet until the namespace is connected, or flush the queue
    /// and send right away.
    fn send_packet(&self, packet: Packet) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        if self.connected() {
            let queued: Vec<Packet> = {
                let mut queue = self.queue.lock().unwrap();
                queue.drain(..).collect()
            };
            for packet in queued {
                engine.send_packet(packet);
                self.packets_sent.fetch_add(1, Ordering::Relaxed);
            }
            engine.send_packet(packet);
            self.packets_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.queue.lock().unwrap().push_back(packet);
        }
    }

    // ==== namespace lifecycle ====

    /// Called by the engine when its handshake completes, and at creation
    /// time when the engine is already connected.
    pub(crate) fn on_engine_open(self: &Arc<Self>) {
        if !self.closed() {
            self.send_connect();
        }
    }

    fn send_connect(self: &Arc<Self>) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        engine.send_packet(Packet::connect(self.nsp.clone(), self.auth.clone()));
        self.arm_connection_timer(CONNECT_TIMEOUT);
    }

    /// Close the namespace: send `DISCONNECT` and tear down after the grace
    /// period, or as soon as the server confirms.
    pub fn close(self: &Arc<Self>) {
        if self.closed() || !self.connected() {
            return;
        }
        self.send_packet(Packet::disconnect(self.nsp.clone()));
        self.arm_connection_timer(CLOSE_GRACE);
    }

    fn arm_connection_timer(self: &Arc<Self>, timeout: Duration) {
        let socket = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            tracing::debug!(ns = %socket.nsp, "connection timer fired, closing namespace");
            socket.on_close();
        });
        let previous = self
            .connection_timer
            .lock()
            .unwrap()
            .replace(handle.abort_handle());
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn cancel_connection_timer(&self) {
        if let Some(timer) = self.connection_timer.lock().unwrap().take() {
            timer.abort();
        }
    }

    /// Final teardown: the grace timer fired, the connect timer expired or
    /// the server confirmed the disconnect.
    pub(crate) fn on_close(self: &Arc<Self>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel_connection_timer();
        self.connected.store(false, Ordering::SeqCst);
        self.queue.lock().unwrap().clear();
        let pending: Vec<AckEntry> = {
            let mut acks = self.acks.lock().unwrap();
            acks.drain().map(|(_, entry)| entry).collect()
        };
        for entry in pending {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
        if let Some(engine) = self.engine.upgrade() {
            engine.notify_socket_close(&self.nsp);
            engine.remove_socket(&self.nsp);
        }
    }

    /// Called by the engine when the transport drops: the namespace returns
    /// to the pre-connect state and queued emits are discarded.
    pub(crate) fn on_engine_disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.queue.lock().unwrap().clear();
        }
    }

    fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ==== inbound packets ====

    pub(crate) fn on_packet(self: &Arc<Self>, packet: Packet) {
        if self.closed() {
            return;
        }
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        match packet.inner {
            PacketData::Connect(_) => self.on_connected(),
            PacketData::Disconnect => self.on_close(),
            PacketData::Event(data, ack) | PacketData::BinaryEvent(data, ack) => {
                self.on_event(data, ack)
            }
            PacketData::EventAck(data, ack) | PacketData::BinaryAck(data, ack) => {
                self.on_ack(data, ack)
            }
            PacketData::ConnectError(data) => self.on_error_packet(&data),
        }
    }

    fn on_connected(self: &Arc<Self>) {
        self.cancel_connection_timer();
        if !self.connected.swap(true, Ordering::SeqCst) {
            *self.connected_at.lock().unwrap() = Some(SystemTime::now());
            let engine = self.engine.upgrade();
            if let Some(engine) = &engine {
                engine.notify_socket_open(&self.nsp);
            }
            // Flush the pre-connect queue in FIFO order, outside the lock.
            let queued: Vec<Packet> = {
                let mut queue = self.queue.lock().unwrap();
                queue.drain(..).collect()
            };
            if let Some(engine) = engine {
                for packet in queued {
                    engine.send_packet(packet);
                    self.packets_sent.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn on_event(self: &Arc<Self>, data: Value, ack_id: Option<i64>) {
        let Value::Array(items) = data else {
            return;
        };
        let mut items = items.into_iter();
        let Some(Value::Str(name)) = items.next() else {
            return;
        };
        let mut event = Event {
            nsp: self.nsp.clone(),
            name: name.clone(),
            args: items.collect(),
            need_ack: ack_id.is_some(),
            ack_message: Vec::new(),
        };

        let listener = self.bindings.lock().unwrap().get(&name).cloned();
        if let Some(listener) = listener {
            listener(&mut event);
        }
        let any_listener = self.any_listener.lock().unwrap().clone();
        if let Some(any_listener) = any_listener {
            any_listener(&mut event);
        }

        if let Some(id) = ack_id {
            if !event.ack_message.is_empty() {
                let payload = Value::Array(event.ack_message);
                self.send_packet(Packet::ack(self.nsp.clone(), payload, id));
            }
        }
    }

    fn on_ack(&self, data: Value, id: i64) {
        let entry = u32::try_from(id)
            .ok()
            .and_then(|id| self.acks.lock().unwrap().remove(&id));
        // An unknown id is a stale reply after its timeout fired.
        let Some(entry) = entry else {
            return;
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        let args = match data {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };
        (entry.callback)(args);
    }

    fn on_error_packet(&self, data: &Value) {
        let listener = self.error_listener.lock().unwrap().clone();
        if let Some(listener) = listener {
            listener(data);
        }
    }

    // ==== metrics ====

    /// Snapshot the socket and engine counters.
    pub fn metrics(&self) -> ConnectionMetrics {
        let (reconnection_count, last_ping_latency) = match self.engine.upgrade() {
            Some(engine) => (
                engine.reconnection_count(),
                Duration::from_millis(engine.last_ping_latency_ms()),
            ),
            None => (0, Duration::ZERO),
        };
        ConnectionMetrics {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            reconnection_count,
            last_ping_latency,
            connected_at: *self.connected_at.lock().unwrap(),
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Socket")
            .field("nsp", &self.nsp)
            .field("connected", &self.connected)
            .field("closed", &self.closed)
            .field("acks", &self.acks)
            .finish()
    }
}
