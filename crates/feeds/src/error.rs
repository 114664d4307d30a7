//! Error types for feed operations.

use gossip_core::Exchange;
use thiserror::Error;

/// Errors that can occur during feed operations.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("WebSocket disconnected: {0}")]
    Disconnected(String),

    #[error("Failed to parse message: {0}")]
    ParseError(String),

    #[error("Subscription rejected: {0}")]
    SubscriptionRejected(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Listing probe failed: {0}")]
    ProbeFailed(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::ConnectionFailed(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::ParseError(err.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Http(err.to_string())
    }
}

impl From<url::ParseError> for FeedError {
    fn from(err: url::ParseError) -> Self {
        FeedError::ConnectionFailed(err.to_string())
    }
}

impl FeedError {
    /// Returns true for stream-level failures that warrant an immediate
    /// reconnect: bad frames, read timeouts and dropped connections.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FeedError::Disconnected(_) | FeedError::ParseError(_) | FeedError::Timeout(_)
        )
    }

    /// Returns true if the feed must stop for the rest of the run.
    pub fn is_permanent(&self) -> bool {
        matches!(self, FeedError::SubscriptionRejected(_))
    }
}

/// Errors raised while assembling the feed registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("exchange {0} registered twice")]
    DuplicateExchange(Exchange),
}
