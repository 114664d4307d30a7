//! Notification sinks.

use crate::message::{format_alert_message, host_name, Markup};
use async_trait::async_trait;
use chrono::Utc;
use gossip_core::{SpreadSnapshot, TradingPair};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Telegram API error: {0}")]
    Telegram(#[from] teloxide::RequestError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),
}

/// A destination for spread alerts.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs and cooldown bookkeeping.
    fn name(&self) -> &str;

    async fn notify(&self, pair: &TradingPair, snapshot: &SpreadSnapshot) -> Result<(), NotifyError>;
}

/// Writes alerts to the log instead of sending them anywhere.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    host: String,
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl LogNotifier {
    pub fn new() -> Self {
        Self { host: host_name() }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, pair: &TradingPair, snapshot: &SpreadSnapshot) -> Result<(), NotifyError> {
        let message = format_alert_message(pair, snapshot, &self.host, Utc::now(), Markup::Plain);
        info!(
            pair = %pair,
            highest = %snapshot.max.exchange,
            lowest = %snapshot.min.exchange,
            pct_diff = snapshot.pct_diff,
            "Spread alert\n{}",
            message
        );
        Ok(())
    }
}
