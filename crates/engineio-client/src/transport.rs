//! Websocket transport setup.
//!
//! [`connect`] resolves the connect URL into an open
//! [`WebSocketStream`], taking care of extra HTTP headers, TLS for `wss`
//! URLs and an optional HTTP `CONNECT` proxy with basic auth. Frame I/O on
//! the returned stream belongs to the connection engine.

use std::collections::BTreeMap;

use base64::{engine::general_purpose, Engine as _};
use http::{HeaderName, HeaderValue, Uri};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async_tls, connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

/// The stream type produced by [`connect`].
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An HTTP proxy to tunnel the websocket connection through.
#[derive(Debug, Clone)]
pub struct Proxy {
    /// The proxy base URL, e.g. `http://proxy.corp:3128`
    pub url: String,
    /// Optional `(username, password)` pair for basic auth
    pub auth: Option<(String, String)>,
}

/// Open a websocket connection to `url`.
///
/// `headers` are merged into the upgrade request, replacing any header of the
/// same name. With a proxy the connection is tunneled through an HTTP
/// `CONNECT` request first.
pub async fn connect(
    url: &str,
    headers: &BTreeMap<String, String>,
    proxy: Option<&Proxy>,
) -> Result<WsStream, Error> {
    let mut request = url.into_client_request()?;
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|_| Error::InvalidHeader(key.clone()))?;
        let value = HeaderValue::from_str(value).map_err(|_| Error::InvalidHeader(key.clone()))?;
        request.headers_mut().insert(name, value);
    }

    match proxy {
        Some(proxy) => {
            let stream = tunnel(proxy, request.uri()).await?;
            let (ws, _) = client_async_tls(request, stream).await?;
            Ok(ws)
        }
        None => {
            let (ws, _) = connect_async(request).await?;
            Ok(ws)
        }
    }
}

/// Establish an HTTP `CONNECT` tunnel through the proxy to the target host.
async fn tunnel(proxy: &Proxy, target: &Uri) -> Result<TcpStream, Error> {
    let proxy_url = Url::parse(&proxy.url).map_err(|_| Error::InvalidUrl(proxy.url.clone()))?;
    let proxy_host = proxy_url
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(proxy.url.clone()))?;
    let proxy_port = proxy_url.port_or_known_default().unwrap_or(80);

    let host = target
        .host()
        .ok_or_else(|| Error::InvalidUrl(target.to_string()))?;
    let port = target
        .port_u16()
        .unwrap_or(if target.scheme_str() == Some("wss") { 443 } else { 80 });

    tracing::debug!(proxy = %proxy_host, target = %host, "opening proxy tunnel");
    let mut stream = TcpStream::connect((proxy_host, proxy_port)).await?;

    let mut req = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n");
    if let Some((username, password)) = &proxy.auth {
        let token = general_purpose::STANDARD.encode(format!("{username}:{password}"));
        req.push_str("Proxy-Authorization: Basic ");
        req.push_str(&token);
        req.push_str("\r\n");
    }
    req.push_str("\r\n");
    stream.write_all(req.as_bytes()).await?;

    // The response head is tiny, read it byte-wise so nothing of the
    // websocket handshake is consumed.
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await? == 0 {
            return Err(Error::Proxy("connection closed during tunnel setup".into()));
        }
        head.push(byte[0]);
        if head.len() > 8192 {
            return Err(Error::Proxy("oversized tunnel response".into()));
        }
    }
    let head = String::from_utf8_lossy(&head);
    let status = head.split_whitespace().nth(1).unwrap_or("");
    if !status.starts_with('2') {
        return Err(Error::Proxy(format!("status {status}")));
    }
    Ok(stream)
}
