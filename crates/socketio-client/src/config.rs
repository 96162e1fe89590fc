//! Client configuration.

use std::collections::BTreeMap;

use crate::value::Value;

pub use engineio_client::Proxy;

/// Reconnection behavior of the engine.
///
/// The delay before attempt `k` is `delay · 2^k`, saturated at `delay_max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Whether the engine reconnects at all after a non-user disconnect
    pub enabled: bool,
    /// Maximum number of attempts per outage before giving up
    pub attempts: u32,
    /// Initial backoff delay in milliseconds
    pub delay: u64,
    /// Backoff saturation in milliseconds
    pub delay_max: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attempts: u32::MAX,
            delay: 5000,
            delay_max: 25000,
        }
    }
}

impl ReconnectConfig {
    pub fn new(attempts: u32, delay: u64, delay_max: u64) -> Self {
        Self {
            enabled: true,
            attempts,
            delay,
            delay_max,
        }
    }

    /// A config that never reconnects.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Optional per-connection parameters for [`Client::connect_with`](crate::Client::connect_with).
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Extra query parameters appended percent-encoded to the connect URL
    pub query: BTreeMap<String, String>,
    /// Extra HTTP headers for the websocket upgrade request
    pub headers: BTreeMap<String, String>,
    /// Auth payload sent in every namespace `CONNECT` packet
    pub auth: Option<Value>,
}

/// How chatty the engine is on the `tracing` subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogVerbosity {
    /// Connection lifecycle events only
    #[default]
    Default,
    /// Nothing at all
    Quiet,
    /// Lifecycle events plus every frame
    Verbose,
}
