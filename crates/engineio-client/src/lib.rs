//! Engine.IO v4 client transport over websocket.
//!
//! This crate covers the lower half of a socket.io client connection:
//!
//! * The [`Packet`](packet::Packet) frame codec: one Engine.IO packet maps to
//!   one websocket frame, text frames carry a leading type digit, binary
//!   frames carry raw attachment bytes.
//! * [`url`]: turning a user-supplied `http(s)` URI into the
//!   `ws(s)://…/socket.io/?EIO=4&transport=websocket…` connect URL.
//! * [`transport`]: opening the websocket itself, with extra HTTP headers,
//!   TLS for `wss` and an optional HTTP `CONNECT` proxy with basic auth.
//!
//! The HTTP long-polling transport and the polling→websocket upgrade dance
//! are not implemented: the client dials websocket directly and never
//! negotiates an upgrade.

pub mod error;
pub mod packet;
pub mod transport;
pub mod url;

pub use error::Error;
pub use packet::{OpenPacket, Packet};
pub use transport::{Proxy, WsStream};
