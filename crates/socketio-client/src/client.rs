//! The public [`Client`] handle.

use std::sync::Arc;

use engineio_client::Proxy;

use crate::config::{ConnectOptions, LogVerbosity, ReconnectConfig};
use crate::engine::{ClientListeners, ConnectionState, Engine};
use crate::errors::{ConnectionError, DisconnectReason};
use crate::socket::Socket;

/// A socket.io client.
///
/// The handle is cheap to clone and safe to share between threads; all
/// methods may be called from any thread. Connection work happens on a
/// driver task inside the tokio runtime, so [`connect`](Client::connect)
/// must be called from within a runtime.
#[derive(Clone)]
pub struct Client {
    engine: Arc<Engine>,
}

impl Client {
    pub fn new() -> Self {
        Self {
            engine: Engine::new(),
        }
    }

    // ==== connection ====

    /// Open the connection to the given `http(s)` URI.
    pub fn connect(&self, uri: &str) {
        self.connect_with(uri, ConnectOptions::default());
    }

    /// Open the connection with extra query parameters, HTTP headers and an
    /// auth payload for namespace connections.
    pub fn connect_with(&self, uri: &str, opts: ConnectOptions) {
        self.engine.connect(uri, opts);
    }

    /// Close the connection. Returns immediately; pending reconnect attempts
    /// are aborted and every namespace is closed.
    pub fn close(&self) {
        self.engine.close();
    }

    /// Close the connection and wait for the driver task to drain.
    pub async fn sync_close(&self) {
        let driver = self.engine.begin_sync_close();
        if let Some(driver) = driver {
            driver.await.ok();
        }
        self.engine.settle_closed();
    }

    /// Whether the engine handshake has completed.
    pub fn opened(&self) -> bool {
        self.engine.opened()
    }

    /// The current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.engine.state()
    }

    /// The engine.io session id, when connected.
    pub fn session_id(&self) -> Option<String> {
        self.engine.session_id()
    }

    /// The socket for the given namespace, created on first use.
    ///
    /// `""` means the root namespace `/`; a missing leading slash is added.
    pub fn socket(&self, nsp: &str) -> Arc<Socket> {
        self.engine.socket(nsp)
    }

    // ==== configuration ====

    /// Replace the reconnection configuration.
    pub fn set_reconnect_config(&self, config: ReconnectConfig) {
        self.engine.set_reconnect_config(config);
    }

    /// Control how chatty the engine is on the `tracing` subscriber.
    pub fn set_log_verbosity(&self, verbosity: LogVerbosity) {
        self.engine.set_verbosity(verbosity);
    }

    /// Tunnel the connection through an HTTP proxy with basic auth.
    pub fn set_proxy_basic_auth(&self, url: &str, username: &str, password: &str) {
        self.engine.set_proxy(Some(Proxy {
            url: url.to_string(),
            auth: Some((username.to_string(), password.to_string())),
        }));
    }

    // ==== listeners ====

    /// Called once the engine handshake completes.
    pub fn on_open(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners().open = Some(Arc::new(listener));
    }

    /// Called when a connection attempt fails, with the classified error.
    pub fn on_fail(&self, listener: impl Fn(ConnectionError) + Send + Sync + 'static) {
        self.listeners().fail = Some(Arc::new(listener));
    }

    /// Called when the connection closes for good, with the classified
    /// reason. Not called between reconnect attempts.
    pub fn on_close(&self, listener: impl Fn(DisconnectReason) + Send + Sync + 'static) {
        self.listeners().close = Some(Arc::new(listener));
    }

    /// Called when a reconnect attempt starts.
    pub fn on_reconnecting(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners().reconnecting = Some(Arc::new(listener));
    }

    /// Called when a reconnect attempt is scheduled, with the 1-based
    /// attempt number and the backoff delay in milliseconds.
    pub fn on_reconnect(&self, listener: impl Fn(u32, u64) + Send + Sync + 'static) {
        self.listeners().reconnect = Some(Arc::new(listener));
    }

    /// Called on every connection state transition.
    pub fn on_state(&self, listener: impl Fn(ConnectionState) + Send + Sync + 'static) {
        self.listeners().state = Some(Arc::new(listener));
    }

    /// Called when a namespace finishes its handshake.
    pub fn on_socket_open(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.listeners().socket_open = Some(Arc::new(listener));
    }

    /// Called when a namespace is closed.
    pub fn on_socket_close(&self, listener: impl Fn(&str) + Send + Sync + 'static) {
        self.listeners().socket_close = Some(Arc::new(listener));
    }

    /// Drop every registered listener.
    pub fn clear_listeners(&self) {
        *self.engine.listeners.lock().unwrap() = ClientListeners::default();
    }

    fn listeners(&self) -> std::sync::MutexGuard<'_, ClientListeners> {
        self.engine.listeners.lock().unwrap()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.connection_state())
            .field("session_id", &self.session_id())
            .finish()
    }
}
