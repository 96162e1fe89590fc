use std::time::{Duration, SystemTime};

/// A point-in-time snapshot of per-namespace and engine counters, obtained
/// with [`Socket::metrics`](crate::Socket::metrics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetrics {
    /// Packets this namespace put on the wire
    pub packets_sent: u64,
    /// Packets this namespace received
    pub packets_received: u64,
    /// Reconnection attempts made in the current outage, zeroed on a
    /// successful handshake
    pub reconnection_count: u32,
    /// Wall-clock delta between the two most recent server PINGs
    pub last_ping_latency: Duration,
    /// When the namespace last entered the connected state
    pub connected_at: Option<SystemTime>,
}
