//! Per-exchange feed: listing probe, then a reconnecting stream that keeps
//! the latest price cell up to date.

use crate::adapter::{ExchangeAdapter, Listing};
use crate::websocket::{Session, SessionEnd};
use crate::{ConnectionState, FeedConfig, FeedHandle, PricePublisher};
use gossip_core::Exchange;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why [`ExchangeFeed::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedExit {
    /// The probe did not confirm the pair; nothing was streamed.
    NotListed,
    Cancelled,
    /// The exchange refused the subscription. Not retried.
    SubscriptionRejected(String),
}

/// Feed for one exchange and one pair.
pub struct ExchangeFeed {
    adapter: Box<dyn ExchangeAdapter>,
    config: FeedConfig,
    http: reqwest::Client,
    publisher: PricePublisher,
    symbol: Option<String>,
}

impl ExchangeFeed {
    pub fn new(adapter: Box<dyn ExchangeAdapter>, config: FeedConfig, http: reqwest::Client) -> Self {
        Self {
            adapter,
            config,
            http,
            publisher: PricePublisher::new(),
            symbol: None,
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.adapter.exchange()
    }

    /// Exchange-native symbol, known once the probe succeeded.
    pub fn symbol(&self) -> Option<&str> {
        self.symbol.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        self.publisher.state()
    }

    /// Read handle, available once the pair is listed.
    pub fn handle(&self) -> Option<FeedHandle> {
        self.symbol
            .as_ref()
            .map(|symbol| self.publisher.handle(self.exchange(), symbol.clone()))
    }

    /// Check whether the pair is tradeable. Any failure counts as not listed.
    pub async fn probe_listing(&mut self) -> bool {
        let exchange = self.exchange();
        self.publisher.set_state(ConnectionState::Probing);

        let probe = tokio::time::timeout(
            self.config.probe_timeout,
            self.adapter.probe_listing(&self.http),
        )
        .await;

        match probe {
            Ok(Ok(Listing::Listed(symbol))) => {
                info!("{}: {} is listed", exchange, symbol);
                self.symbol = Some(symbol);
                self.publisher.set_state(ConnectionState::Listed);
                true
            }
            Ok(Ok(Listing::NotListed)) => {
                info!("{}: pair is not offered", exchange);
                self.publisher.set_state(ConnectionState::NotListed);
                false
            }
            Ok(Err(e)) => {
                warn!("{}: listing probe failed: {}", exchange, e);
                self.publisher.set_state(ConnectionState::NotListed);
                false
            }
            Err(_) => {
                warn!(
                    "{}: listing probe timed out after {:?}",
                    exchange, self.config.probe_timeout
                );
                self.publisher.set_state(ConnectionState::NotListed);
                false
            }
        }
    }

    /// Stream until cancelled. Transient failures reconnect at once, others
    /// after a doubling delay; a rejected subscription ends the feed.
    pub async fn run(self, cancel: CancellationToken) -> FeedExit {
        let exchange = self.exchange();
        let Some(symbol) = self.symbol.as_deref() else {
            return FeedExit::NotListed;
        };

        let session = Session {
            adapter: self.adapter.as_ref(),
            config: &self.config,
            publisher: &self.publisher,
            http: &self.http,
            symbol,
        };

        let mut backoff = self.config.reconnect_delay;
        let mut reconnects = 0u64;

        loop {
            let mut reached_streaming = false;
            let result = session.run(&cancel, || reached_streaming = true).await;
            if reached_streaming {
                backoff = self.config.reconnect_delay;
            }

            match result {
                Ok(SessionEnd::Cancelled) => break,
                Err(e) if e.is_permanent() => {
                    error!("{}: {}, stopping feed", exchange, e);
                    self.publisher.set_state(ConnectionState::Disconnected);
                    return FeedExit::SubscriptionRejected(e.to_string());
                }
                Err(e) => {
                    self.publisher.set_state(ConnectionState::Disconnected);
                    reconnects += 1;

                    if e.is_transient() {
                        warn!("{}: {}. Reconnecting (#{})", exchange, e, reconnects);
                        continue;
                    }

                    warn!(
                        "{}: {}. Reconnecting in {:.1}s (#{})",
                        exchange,
                        e,
                        backoff.as_secs_f64(),
                        reconnects
                    );
                    if sleep_or_cancel(backoff, &cancel).await {
                        break;
                    }
                    backoff = self.config.next_backoff(backoff);
                }
            }
        }

        debug!("{}: feed stopped after {} reconnects", exchange, reconnects);
        self.publisher.set_state(ConnectionState::Disconnected);
        FeedExit::Cancelled
    }
}

/// Returns true if cancelled before the delay elapsed.
async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
