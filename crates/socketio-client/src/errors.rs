use std::fmt;

use engineio_client::Error as TransportError;
use tokio_tungstenite::tungstenite;

/// All the possible reasons for the connection to be closed.
///
/// It is passed to the close listener registered with
/// [`Client::on_close`](crate::Client::on_close).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DisconnectReason {
    /// The user called [`close`](crate::Client::close) or aborted a
    /// reconnection in progress
    ClientDisconnect,

    /// The server closed the connection cleanly
    ServerDisconnect,

    /// The transport ended without a close frame
    TransportClose,

    /// The connection was abruptly closed (network error, protocol error)
    TransportError,

    /// The server stopped sending PING packets in time
    PingTimeout,

    /// A single namespace was disconnected
    NamespaceDisconnect,

    /// Every reconnection attempt has been exhausted
    MaxReconnectAttempts,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use DisconnectReason::*;
        let str: &'static str = match self {
            ClientDisconnect => "client closed the connection",
            ServerDisconnect => "server closed the connection",
            TransportClose => "transport closed without a close frame",
            TransportError => "the connection was abruptly closed",
            PingTimeout => "server did not send a PING packet in time",
            NamespaceDisconnect => "namespace was disconnected",
            MaxReconnectAttempts => "reconnection attempts exhausted",
        };
        f.write_str(str)
    }
}

/// Classified transport setup failures, passed to the fail listener
/// registered with [`Client::on_fail`](crate::Client::on_fail).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConnectionError {
    /// The connection attempt timed out
    Timeout,
    /// DNS resolution or the TCP connection failed
    NetworkFailure,
    /// The peer violated the websocket or socket.io protocol
    ProtocolError,
    /// The server rejected the namespace connection
    AuthenticationFailed,
    /// The websocket upgrade request was rejected
    TransportOpenFailed,
    /// The TLS handshake failed
    SslError,
    /// Anything else
    Unknown,
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ConnectionError::*;
        let str: &'static str = match self {
            Timeout => "connection attempt timed out",
            NetworkFailure => "network unreachable or DNS failure",
            ProtocolError => "invalid socket.io protocol",
            AuthenticationFailed => "authentication rejected by the server",
            TransportOpenFailed => "websocket handshake failed",
            SslError => "TLS handshake failed",
            Unknown => "unknown connection error",
        };
        f.write_str(str)
    }
}

/// Error type for ack operations.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckError {
    /// The ack response timed out
    #[error("ack timeout error")]
    Timeout,

    /// The socket was closed before the ack arrived
    #[error("socket closed before the ack arrived")]
    Closed,
}

/// Map a transport setup failure to its user facing classification.
pub(crate) fn classify_transport_error(err: &TransportError) -> ConnectionError {
    use tungstenite::Error as WsError;
    match err {
        TransportError::InvalidUrl(_) | TransportError::InvalidHeader(_) => {
            ConnectionError::Unknown
        }
        TransportError::Proxy(_) => ConnectionError::TransportOpenFailed,
        TransportError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
            ConnectionError::Timeout
        }
        TransportError::Io(_) => ConnectionError::NetworkFailure,
        TransportError::Handshake(e) => match e {
            WsError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => ConnectionError::Timeout,
            WsError::Io(_) => ConnectionError::NetworkFailure,
            WsError::Tls(_) => ConnectionError::SslError,
            WsError::Http(_) | WsError::HttpFormat(_) => ConnectionError::TransportOpenFailed,
            WsError::Protocol(_) => ConnectionError::ProtocolError,
            WsError::Url(_) => ConnectionError::NetworkFailure,
            _ => ConnectionError::Unknown,
        },
    }
}
