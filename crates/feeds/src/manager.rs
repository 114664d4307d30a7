//! Connection lifecycle state and feed tuning.

use std::fmt;
use std::time::Duration;

/// Lifecycle state of one exchange feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Listing probe not yet answered.
    Probing,
    /// Pair is tradeable; no connection opened yet.
    Listed,
    /// Pair is not offered, or the probe failed. Terminal.
    NotListed,
    Connecting,
    Streaming,
    Disconnected,
}

impl ConnectionState {
    pub fn is_streaming(self) -> bool {
        matches!(self, ConnectionState::Streaming)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Probing => "probing",
            ConnectionState::Listed => "listed",
            ConnectionState::NotListed => "not-listed",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a feed connection.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// First delay after an unexpected error.
    pub reconnect_delay: Duration,
    /// Upper bound for the doubling backoff.
    pub max_reconnect_delay: Duration,
    /// Opening handshake limit.
    pub connect_timeout: Duration,
    /// A connection silent for this long is considered dead.
    pub read_timeout: Duration,
    /// Keepalive period (application ping or WebSocket ping).
    pub ping_interval: Duration,
    /// Frames to read while waiting for a subscription ack.
    pub max_handshake_frames: usize,
    /// Listing probe request limit.
    pub probe_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(300),
            max_reconnect_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(15),
            max_handshake_frames: 16,
            probe_timeout: Duration::from_secs(10),
        }
    }
}

impl FeedConfig {
    /// Delay to use after `current`, doubling up to `max_reconnect_delay`.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .clamp(self.reconnect_delay, self.max_reconnect_delay)
    }
}
