//! A socket.io v4 client over an engine.io v4 websocket transport.
//!
//! The client multiplexes independent namespaces over one long-lived
//! connection, emits named events with structured payloads (including raw
//! binary buffers), correlates acknowledgements, and transparently
//! reconnects with exponential backoff when the transport fails.
//!
//! # Example
//! ```no_run
//! use socketio_client::{Client, Value};
//!
//! # async fn run() {
//! let client = Client::new();
//! let chat = client.socket("/chat");
//! chat.on("message", |ev| {
//!     println!("{}: {}", ev.name(), ev.message().as_str());
//! });
//! client.connect("http://localhost:3000");
//!
//! chat.emit("message", vec![Value::from("hello")]);
//! let ack = chat
//!     .emit_async("sum", vec![Value::from(1), Value::from(2)], None)
//!     .await
//!     .unwrap();
//! assert_eq!(ack[0].as_int(), 3);
//! # }
//! ```
//!
//! # Threading
//!
//! One driver task owns the websocket and executes every timer, decode and
//! send completion. [`Client`] and [`Socket`] handles may be used from any
//! thread: cheap mutations take a short lock, connection work is posted to
//! the driver. Listeners run on the driver task and are never invoked while
//! an internal lock is held.

mod ack;
mod client;
mod config;
mod engine;
mod errors;
mod metrics;
mod packet;
mod parser;
mod socket;
mod value;

pub use client::Client;
pub use config::{ConnectOptions, LogVerbosity, Proxy, ReconnectConfig};
pub use engine::ConnectionState;
pub use errors::{AckError, ConnectionError, DisconnectReason};
pub use metrics::ConnectionMetrics;
pub use packet::{Packet, PacketData};
pub use parser::{serialize_packet, Decoder};
pub use socket::{Event, Socket};
pub use value::{Value, ValueKind};
