//! The connection engine.
//!
//! One driver task per `connect()` run owns the websocket transport and
//! serializes every state transition: handshake, heartbeat, disconnect
//! classification and the exponential-backoff reconnect loop. User threads
//! never touch the transport; they post [`Command`]s over an mpsc channel and
//! the driver drains them between frames, which is what gives emits their
//! ordering guarantee.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use engineio_client::{transport, url, Packet as EioPacket, Proxy, WsStream};

use crate::config::{ConnectOptions, LogVerbosity, ReconnectConfig};
use crate::errors::{classify_transport_error, ConnectionError, DisconnectReason};
use crate::packet::{Packet, PacketData};
use crate::parser::{self, Decoder};
use crate::socket::Socket;
use crate::value::Value;

/// Time the driver waits for the close handshake to finish before dropping
/// the transport.
const CLOSE_GRACE: Duration = Duration::from_secs(3);
/// Placeholder deadline before the handshake announces the real heartbeat
/// window.
const FAR_FUTURE: Duration = Duration::from_secs(86_400);

/// The connection state of a client, observable with
/// [`Client::connection_state`](crate::Client::connection_state).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
    Closing = 4,
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Closing,
            _ => ConnectionState::Disconnected,
        }
    }
}

pub(crate) type ConListener = Arc<dyn Fn() + Send + Sync>;
pub(crate) type CloseListener = Arc<dyn Fn(DisconnectReason) + Send + Sync>;
pub(crate) type FailListener = Arc<dyn Fn(ConnectionError) + Send + Sync>;
pub(crate) type ReconnectListener = Arc<dyn Fn(u32, u64) + Send + Sync>;
pub(crate) type StateListener = Arc<dyn Fn(ConnectionState) + Send + Sync>;
pub(crate) type SocketListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Listeners registered on the client handle. Every notification snapshots
/// the listener under the lock and invokes it after release, so user code
/// never runs under the registry mutex.
#[derive(Default)]
pub(crate) struct ClientListeners {
    pub open: Option<ConListener>,
    pub fail: Option<FailListener>,
    pub close: Option<CloseListener>,
    pub reconnecting: Option<ConListener>,
    pub reconnect: Option<ReconnectListener>,
    pub state: Option<StateListener>,
    pub socket_open: Option<SocketListener>,
    pub socket_close: Option<SocketListener>,
}

/// Work posted to the driver task by user threads.
pub(crate) enum Command {
    /// Encode and send one socket.io packet
    Packet(Packet),
    /// Close the transport with the given local close code
    Close(CloseCode, &'static str),
}

#[derive(Debug, Default)]
struct SessionEnd {
    /// Close code of the frame we sent, if any
    local_close: Option<CloseCode>,
    /// Close code of the frame the server sent, if any
    server_close: Option<CloseCode>,
    /// The transport failed with a read or write error
    error: bool,
}

enum Outcome {
    SetupFailed(ConnectionError),
    Session(SessionEnd),
}

pub(crate) struct Engine {
    state: AtomicU8,
    sid: Mutex<String>,
    sockets: Mutex<HashMap<String, Arc<Socket>>>,
    pub(crate) listeners: Mutex<ClientListeners>,

    /// Command channel of the live session, present while the driver holds a
    /// transport
    cmd_tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    driver: Mutex<Option<JoinHandle<()>>>,
    /// Set by `close()`; a queued reconnect timer must never re-enter
    /// Connecting once this is up
    abort_retries: AtomicBool,
    /// Bumped by `connect()` and `close()`. A driver run whose token no
    /// longer matches is stale and must stop instead of scheduling further
    /// attempts, even when `abort_retries` was reset by a newer `connect()`.
    generation: AtomicU64,
    close_notify: Notify,

    reconnect: Mutex<ReconnectConfig>,
    reconn_made: AtomicU32,
    pending_reason: Mutex<Option<DisconnectReason>>,
    last_ping_latency_ms: AtomicU64,
    verbosity: Mutex<LogVerbosity>,

    base_url: Mutex<String>,
    query_string: Mutex<String>,
    headers: Mutex<std::collections::BTreeMap<String, String>>,
    auth: Mutex<Option<Value>>,
    proxy: Mutex<Option<Proxy>>,
}

impl Engine {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            sid: Mutex::new(String::new()),
            sockets: Mutex::new(HashMap::new()),
            listeners: Mutex::new(ClientListeners::default()),
            cmd_tx: Mutex::new(None),
            driver: Mutex::new(None),
            abort_retries: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            close_notify: Notify::new(),
            reconnect: Mutex::new(ReconnectConfig::default()),
            reconn_made: AtomicU32::new(0),
            pending_reason: Mutex::new(None),
            last_ping_latency_ms: AtomicU64::new(0),
            verbosity: Mutex::new(LogVerbosity::default()),
            base_url: Mutex::new(String::new()),
            query_string: Mutex::new(String::new()),
            headers: Mutex::new(std::collections::BTreeMap::new()),
            auth: Mutex::new(None),
            proxy: Mutex::new(None),
        })
    }

    // ==== state & config ====

    pub(crate) fn state(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::SeqCst))
    }

    pub(crate) fn opened(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::SeqCst);
        let listener = self.listeners.lock().unwrap().state.clone();
        if let Some(listener) = listener {
            listener(state);
        }
    }

    pub(crate) fn session_id(&self) -> Option<String> {
        let sid = self.sid.lock().unwrap();
        (!sid.is_empty()).then(|| sid.clone())
    }

    pub(crate) fn set_reconnect_config(&self, config: ReconnectConfig) {
        *self.reconnect.lock().unwrap() = config;
    }

    pub(crate) fn set_verbosity(&self, verbosity: LogVerbosity) {
        *self.verbosity.lock().unwrap() = verbosity;
    }

    pub(crate) fn set_proxy(&self, proxy: Option<Proxy>) {
        *self.proxy.lock().unwrap() = proxy;
    }

    pub(crate) fn reconnection_count(&self) -> u32 {
        self.reconn_made.load(Ordering::SeqCst)
    }

    pub(crate) fn last_ping_latency_ms(&self) -> u64 {
        self.last_ping_latency_ms.load(Ordering::Relaxed)
    }

    fn quiet(&self) -> bool {
        *self.verbosity.lock().unwrap() == LogVerbosity::Quiet
    }

    fn verbose(&self) -> bool {
        *self.verbosity.lock().unwrap() == LogVerbosity::Verbose
    }

    // ==== lifecycle ====

    pub(crate) fn connect(self: &Arc<Self>, uri: &str, opts: ConnectOptions) {
        match self.state() {
            ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Reconnecting => return,
            ConnectionState::Disconnected | ConnectionState::Closing => {}
        }
        let previous = self.driver.lock().unwrap().take();

        *self.base_url.lock().unwrap() = uri.to_string();
        *self.query_string.lock().unwrap() = url::encode_pairs(&opts.query);
        *self.headers.lock().unwrap() = opts.headers;
        *self.auth.lock().unwrap() = opts.auth;
        self.reconn_made.store(0, Ordering::SeqCst);
        self.abort_retries.store(false, Ordering::SeqCst);
        // Invalidate any previous run that is still winding down, so it
        // cannot observe the reset abort flag and keep reconnecting.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.pending_reason.lock().unwrap() = None;
        self.set_state(ConnectionState::Connecting);

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            // A finished run may still be tearing down, let it drain first.
            if let Some(previous) = previous {
                previous.await.ok();
            }
            engine.run(generation).await;
        });
        *self.driver.lock().unwrap() = Some(handle);
    }

    pub(crate) fn close(&self) {
        self.set_state(ConnectionState::Closing);
        self.abort_retries.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        for socket in self.sockets_snapshot() {
            socket.close();
        }
        self.dispatch(Command::Close(CloseCode::Normal, "End by user"));
        self.close_notify.notify_waiters();
    }

    /// The `sync_close` entry: like [`close`](Self::close), additionally
    /// handing the driver handle to the caller to await.
    pub(crate) fn begin_sync_close(&self) -> Option<JoinHandle<()>> {
        self.set_state(ConnectionState::Closing);
        self.abort_retries.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        for socket in self.sockets_snapshot() {
            socket.close();
        }
        self.dispatch(Command::Close(CloseCode::Normal, "End by user"));
        self.close_notify.notify_waiters();
        self.driver.lock().unwrap().take()
    }

    /// Settle the state once the driver has been awaited; only then is there
    /// no concurrent writer left.
    pub(crate) fn settle_closed(&self) {
        if self.state() == ConnectionState::Closing {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    // ==== socket map ====

    pub(crate) fn socket(self: &Arc<Self>, nsp: &str) -> Arc<Socket> {
        let nsp = normalize_nsp(nsp);
        let created = {
            let mut sockets = self.sockets.lock().unwrap();
            match sockets.get(&nsp) {
                Some(socket) => return socket.clone(),
                None => {
                    let auth = self.auth.lock().unwrap().clone();
                    let socket = Socket::new(Arc::downgrade(self), nsp.clone(), auth);
                    sockets.insert(nsp, socket.clone());
                    socket
                }
            }
        };
        // Namespace connections only happen once the transport is ready.
        if self.opened() {
            created.on_engine_open();
        }
        created
    }

    pub(crate) fn remove_socket(&self, nsp: &str) {
        self.sockets.lock().unwrap().remove(nsp);
    }

    fn sockets_snapshot(&self) -> Vec<Arc<Socket>> {
        self.sockets.lock().unwrap().values().cloned().collect()
    }

    fn sockets_on_disconnect(&self) {
        for socket in self.sockets_snapshot() {
            socket.on_engine_disconnect();
        }
    }

    // ==== sending ====

    fn dispatch(&self, command: Command) {
        if let Some(tx) = &*self.cmd_tx.lock().unwrap() {
            tx.send(command).ok();
        }
    }

    pub(crate) fn send_packet(&self, packet: Packet) {
        if self.state() != ConnectionState::Connected {
            return;
        }
        self.dispatch(Command::Packet(packet));
    }

    // ==== listener notifications ====

    fn notify_open(&self) {
        let listener = self.listeners.lock().unwrap().open.clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    fn notify_close(&self, reason: DisconnectReason) {
        let listener = self.listeners.lock().unwrap().close.clone();
        if let Some(listener) = listener {
            listener(reason);
        }
    }

    fn notify_fail(&self, error: ConnectionError) {
        let listener = self.listeners.lock().unwrap().fail.clone();
        if let Some(listener) = listener {
            listener(error);
        }
    }

    fn notify_reconnecting(&self) {
        let listener = self.listeners.lock().unwrap().reconnecting.clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    fn notify_reconnect(&self, attempt: u32, delay: u64) {
        let listener = self.listeners.lock().unwrap().reconnect.clone();
        if let Some(listener) = listener {
            listener(attempt, delay);
        }
    }

    pub(crate) fn notify_socket_open(&self, nsp: &str) {
        let listener = self.listeners.lock().unwrap().socket_open.clone();
        if let Some(listener) = listener {
            listener(nsp);
        }
    }

    pub(crate) fn notify_socket_close(&self, nsp: &str) {
        let listener = self.listeners.lock().unwrap().socket_close.clone();
        if let Some(listener) = listener {
            listener(nsp);
        }
    }

    // ==== the driver ====

    async fn run(self: Arc<Self>, generation: u64) {
        loop {
            // A newer connect() or close() owns the engine now.
            if self.generation.load(Ordering::SeqCst) != generation {
                break;
            }
            let outcome = self.attempt().await;

            // A stale token with the abort flag reset means a newer connect()
            // owns the engine: leave the state and the listeners to it. A
            // plain close() keeps the abort flag up and takes the normal
            // user-close path below.
            if self.generation.load(Ordering::SeqCst) != generation
                && !self.abort_retries.load(Ordering::SeqCst)
            {
                break;
            }

            let user_close = self.state() == ConnectionState::Closing
                || self.abort_retries.load(Ordering::SeqCst);

            self.set_state(ConnectionState::Disconnected);
            self.sockets_on_disconnect();

            let reason = match &outcome {
                Outcome::Session(end) => Some(self.classify(end, user_close)),
                Outcome::SetupFailed(error) => {
                    self.notify_fail(*error);
                    None
                }
            };

            if user_close {
                if reason.is_some() {
                    self.notify_close(DisconnectReason::ClientDisconnect);
                }
                break;
            }

            let config = self.reconnect.lock().unwrap().clone();
            let made = self.reconn_made.load(Ordering::SeqCst);
            if config.enabled && made < config.attempts {
                let delay = next_delay(config.delay, config.delay_max, made);
                if !self.quiet() {
                    tracing::debug!(attempt = made + 1, delay_ms = delay, "scheduling reconnect");
                }
                self.notify_reconnect(made + 1, delay);
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    _ = self.close_notify.notified() => {}
                }
                // The generation token settles the race with a concurrent
                // connect(): it may already have reset the abort flag and
                // the state for its own run.
                if self.abort_retries.load(Ordering::SeqCst)
                    || self.state() == ConnectionState::Closing
                    || self.generation.load(Ordering::SeqCst) != generation
                {
                    break;
                }
                self.reconn_made.fetch_add(1, Ordering::SeqCst);
                self.set_state(ConnectionState::Reconnecting);
                self.notify_reconnecting();
                continue;
            }

            if config.enabled {
                self.notify_close(DisconnectReason::MaxReconnectAttempts);
            } else if let Some(reason) = reason {
                self.notify_close(reason);
            }
            break;
        }
        // A close that interrupted the backoff sleep leaves the state at
        // Closing; settle it. A concurrent connect() owns the state instead.
        if self.state() == ConnectionState::Closing {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    async fn attempt(self: &Arc<Self>) -> Outcome {
        // Fresh engine.io session: no sid, no latched reason.
        self.sid.lock().unwrap().clear();
        *self.pending_reason.lock().unwrap() = None;

        let base = self.base_url.lock().unwrap().clone();
        let query = self.query_string.lock().unwrap().clone();
        let headers = self.headers.lock().unwrap().clone();
        let proxy = self.proxy.lock().unwrap().clone();

        let url = match url::build_ws_url(&base, None, &query) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("cannot build connect url: {e}");
                return Outcome::SetupFailed(ConnectionError::NetworkFailure);
            }
        };
        if !self.quiet() {
            tracing::debug!(state = ?self.state(), "opening websocket transport");
        }
        match transport::connect(&url, &headers, proxy.as_ref()).await {
            Ok(mut ws) => {
                if self.state() == ConnectionState::Closing
                    || self.abort_retries.load(Ordering::SeqCst)
                {
                    // The user closed while the transport was opening.
                    let _ = ws
                        .close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "End by user".into(),
                        }))
                        .await;
                    return Outcome::Session(SessionEnd {
                        local_close: Some(CloseCode::Normal),
                        ..Default::default()
                    });
                }
                Outcome::Session(self.session(ws).await)
            }
            Err(e) => {
                if !self.quiet() {
                    tracing::debug!("transport open failed: {e}");
                }
                Outcome::SetupFailed(classify_transport_error(&e))
            }
        }
    }

    /// Drive one open transport until it closes. All frame I/O, the
    /// heartbeat deadline and command draining happen here.
    async fn session(self: &Arc<Self>, ws: WsStream) -> SessionEnd {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        *self.cmd_tx.lock().unwrap() = Some(cmd_tx);

        let (mut sink, mut stream) = ws.split();
        let mut decoder = Decoder::default();
        let mut end = SessionEnd::default();
        let mut heartbeat_window = FAR_FUTURE;
        let mut handshaken = false;
        let mut close_sent = false;
        let mut last_ping: Option<Instant> = None;
        let mut deadline = Box::pin(tokio::time::sleep(FAR_FUTURE));

        'session: loop {
            tokio::select! {
                message = stream.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        if self.verbose() {
                            tracing::trace!(frame = %text.as_str(), "text frame received");
                        }
                        match EioPacket::try_from(text.as_str()) {
                            Ok(EioPacket::Open(open)) => {
                                if !handshaken {
                                    handshaken = true;
                                    heartbeat_window =
                                        Duration::from_millis(open.ping_interval + open.ping_timeout);
                                    deadline.as_mut().reset(Instant::now() + heartbeat_window);
                                    self.on_handshake(open);
                                }
                            }
                            Ok(EioPacket::Ping) => {
                                let now = Instant::now();
                                if let Some(previous) = last_ping {
                                    self.last_ping_latency_ms
                                        .store((now - previous).as_millis() as u64, Ordering::Relaxed);
                                }
                                last_ping = Some(now);
                                if sink.send(EioPacket::Pong.into_ws_message()).await.is_err() {
                                    end.error = true;
                                    break 'session;
                                }
                                if !close_sent {
                                    deadline.as_mut().reset(Instant::now() + heartbeat_window);
                                }
                            }
                            Ok(EioPacket::Message(data)) => {
                                if let Some(packet) = decoder.decode_str(&data) {
                                    self.route(packet);
                                }
                            }
                            Ok(EioPacket::Close) => {
                                if !self.quiet() {
                                    tracing::debug!("session ended by server");
                                }
                                close_sent = true;
                                end.local_close = Some(CloseCode::Normal);
                                deadline.as_mut().reset(Instant::now() + CLOSE_GRACE);
                                let _ = sink
                                    .send(Message::Close(Some(CloseFrame {
                                        code: CloseCode::Normal,
                                        reason: "End by server".into(),
                                    })))
                                    .await;
                            }
                            Ok(_) => {}
                            Err(e) if !handshaken => {
                                tracing::debug!("handshake error: {e}");
                                close_sent = true;
                                end.local_close = Some(CloseCode::Policy);
                                deadline.as_mut().reset(Instant::now() + CLOSE_GRACE);
                                let _ = sink
                                    .send(Message::Close(Some(CloseFrame {
                                        code: CloseCode::Policy,
                                        reason: "Handshake error".into(),
                                    })))
                                    .await;
                            }
                            Err(e) => {
                                tracing::debug!("ignoring malformed frame: {e}");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        if let Some(packet) = decoder.decode_bin(data) {
                            self.route(packet);
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        end.server_close = Some(frame.map(|f| f.code).unwrap_or(CloseCode::Normal));
                        close_sent = true;
                        deadline.as_mut().reset(Instant::now() + CLOSE_GRACE);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        match e {
                            WsError::ConnectionClosed | WsError::AlreadyClosed => {}
                            e => {
                                if !self.quiet() {
                                    tracing::debug!("transport error: {e}");
                                }
                                end.error = true;
                            }
                        }
                        break 'session;
                    }
                    None => break 'session,
                },
                _ = deadline.as_mut(), if handshaken || close_sent => {
                    if close_sent {
                        break 'session;
                    }
                    if !self.quiet() {
                        tracing::debug!("ping timeout");
                    }
                    *self.pending_reason.lock().unwrap() = Some(DisconnectReason::PingTimeout);
                    close_sent = true;
                    end.local_close = Some(CloseCode::Policy);
                    deadline.as_mut().reset(Instant::now() + CLOSE_GRACE);
                    let _ = sink
                        .send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Policy,
                            reason: "Ping timeout".into(),
                        })))
                        .await;
                },
                command = cmd_rx.recv() => match command {
                    Some(Command::Packet(packet)) => {
                        let (data, bins) = parser::serialize_packet(&packet);
                        if self.verbose() {
                            tracing::trace!(frame = %data, attachments = bins.len(), "sending packet");
                        }
                        let mut frame = String::with_capacity(data.len() + 1);
                        frame.push('4');
                        frame.push_str(&data);
                        if sink.send(Message::text(frame)).await.is_err() {
                            end.error = true;
                            break 'session;
                        }
                        for bin in bins {
                            if sink.send(Message::Binary(bin)).await.is_err() {
                                end.error = true;
                                break 'session;
                            }
                        }
                    }
                    Some(Command::Close(code, reason)) => {
                        close_sent = true;
                        end.local_close = Some(code);
                        deadline.as_mut().reset(Instant::now() + CLOSE_GRACE);
                        let _ = sink
                            .send(Message::Close(Some(CloseFrame {
                                code,
                                reason: reason.into(),
                            })))
                            .await;
                    }
                    None => break 'session,
                },
            }
        }

        *self.cmd_tx.lock().unwrap() = None;
        end
    }

    fn on_handshake(self: &Arc<Self>, open: engineio_client::OpenPacket) {
        if !self.quiet() {
            tracing::debug!(
                sid = %open.sid,
                ping_interval = open.ping_interval,
                ping_timeout = open.ping_timeout,
                "handshake complete"
            );
        }
        *self.sid.lock().unwrap() = open.sid;
        // Only a completed handshake proves the path is healthy; a bare
        // transport open must not reset the backoff.
        self.reconn_made.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
        for socket in self.sockets_snapshot() {
            socket.on_engine_open();
        }
        self.notify_open();
    }

    /// Route one decoded packet to its namespace socket.
    fn route(&self, packet: Packet) {
        match &packet.inner {
            PacketData::Connect(Some(value)) => {
                // post-v4 servers may issue a per-namespace session id
                if let Value::Str(sid) = value.get("sid") {
                    *self.sid.lock().unwrap() = sid.clone();
                }
            }
            PacketData::ConnectError(_) => {
                self.notify_fail(ConnectionError::AuthenticationFailed);
            }
            _ => {}
        }
        let socket = self.sockets.lock().unwrap().get(&packet.ns).cloned();
        match socket {
            Some(socket) => socket.on_packet(packet),
            None => tracing::debug!(ns = %packet.ns, "dropping packet for unknown namespace"),
        }
    }

    fn classify(&self, end: &SessionEnd, user_close: bool) -> DisconnectReason {
        if let Some(reason) = self.pending_reason.lock().unwrap().take() {
            return reason;
        }
        if user_close {
            return DisconnectReason::ClientDisconnect;
        }
        match end.server_close.or(end.local_close) {
            Some(CloseCode::Normal | CloseCode::Away) => DisconnectReason::ServerDisconnect,
            Some(_) => DisconnectReason::TransportError,
            None if end.error => DisconnectReason::TransportError,
            None => DisconnectReason::TransportClose,
        }
    }
}

fn normalize_nsp(nsp: &str) -> String {
    if nsp.is_empty() {
        "/".to_string()
    } else if !nsp.starts_with('/') {
        format!("/{nsp}")
    } else {
        nsp.to_string()
    }
}

/// Backoff delay before reconnect attempt number `made + 1`: exponential
/// doubling saturated at `delay_max`.
fn next_delay(delay: u64, delay_max: u64, made: u32) -> u64 {
    delay
        .saturating_mul(2u64.saturating_pow(made.min(32)))
        .min(delay_max)
}
