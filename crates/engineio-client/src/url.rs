//! Connect URL construction.
//!
//! The user hands the client an `http(s)` URI; the websocket transport wants
//! `ws(s)://host[:port]<path>?EIO=4&transport=websocket[&sid=…]&t=…<query>`.
//! The default resource path is `/socket.io/`.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use url::Url;

use crate::error::Error;

/// Build the websocket connect URL from a user URI.
///
/// `query` is a pre-encoded string of `&key=value` pairs (see
/// [`encode_pairs`]). A non-empty `sid` is forwarded so the server can
/// correlate the session.
pub fn build_ws_url(uri: &str, sid: Option<&str>, query: &str) -> Result<String, Error> {
    let parsed = Url::parse(uri).map_err(|_| Error::InvalidUrl(uri.to_string()))?;
    let scheme = match parsed.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(Error::InvalidUrl(uri.to_string())),
    };
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(uri.to_string()))?;
    // As per RFC2732 a literal IPv6 address must be enclosed in brackets.
    let needs_brackets = host.contains(':') && !host.starts_with('[');
    let port = parsed
        .port_or_known_default()
        .unwrap_or(if scheme == "wss" { 443 } else { 80 });
    let path = match parsed.path() {
        "" | "/" => "/socket.io/",
        path => path,
    };

    let mut out = String::with_capacity(uri.len() + 64);
    out.push_str(scheme);
    out.push_str("://");
    if needs_brackets {
        write!(out, "[{host}]").unwrap();
    } else {
        out.push_str(host);
    }
    write!(out, ":{port}{path}?EIO=4&transport=websocket").unwrap();
    if let Some(sid) = sid.filter(|s| !s.is_empty()) {
        write!(out, "&sid={sid}").unwrap();
    }
    let t = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    write!(out, "&t={t}").unwrap();
    out.push_str(query);
    Ok(out)
}

/// Encode a user query map into a pre-encoded `&key=value` suffix.
pub fn encode_pairs(query: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in query {
        out.push('&');
        out.push_str(key);
        out.push('=');
        out.push_str(&percent_encode(value));
    }
    out
}

/// Percent-encode (RFC3986) every non-alphanumeric character of a query value.
pub fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => out.push(byte as char),
            _ => {
                write!(out, "%{byte:02X}").unwrap();
            }
        }
    }
    out
}
