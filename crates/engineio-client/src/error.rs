use tokio_tungstenite::tungstenite;

/// Transport setup errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The user URI could not be turned into a websocket URL
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// An extra HTTP header had an invalid name or value
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// The TCP connection to the proxy could not be established
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The proxy refused the `CONNECT` tunnel
    #[error("proxy refused the tunnel: {0}")]
    Proxy(String),

    /// The websocket handshake failed (DNS, TCP, TLS or HTTP upgrade)
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),
}
