//! The run loop: probe, warm up, then aggregate and notify every tick.

use crate::{Aggregator, EngineError};
use chrono::Utc;
use futures_util::future::join_all;
use gossip_alerts::NotificationGate;
use gossip_core::{SpreadSnapshot, TradingPair};
use gossip_feeds::{ExchangeAdapter, ExchangeFeed, FeedConfig, FeedExit, FeedRegistry};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the spread monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time given to the feeds to deliver a first price.
    pub warmup: Duration,
    /// Aggregation period.
    pub tick: Duration,
    /// Quotes older than this are logged as stale but still used.
    pub stale_warning: Duration,
    pub feed: FeedConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            warmup: Duration::from_secs(5),
            tick: Duration::from_secs(1),
            stale_warning: Duration::from_secs(60),
            feed: FeedConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Startup,
    Warmup,
    SteadyState,
    Shutdown,
}

/// Outcome of a run that ended by cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub elapsed: Duration,
    /// Aggregation ticks evaluated.
    pub ticks: u64,
    /// Successful sink dispatches.
    pub notifications: usize,
}

/// Watches one pair across several exchanges.
pub struct SpreadMonitor {
    pair: TradingPair,
    config: MonitorConfig,
    adapters: Vec<Box<dyn ExchangeAdapter>>,
    gate: NotificationGate,
    aggregator: Aggregator,
    http: reqwest::Client,
    phase: watch::Sender<Phase>,
}

impl SpreadMonitor {
    pub fn new(
        pair: TradingPair,
        config: MonitorConfig,
        adapters: Vec<Box<dyn ExchangeAdapter>>,
        gate: NotificationGate,
    ) -> Self {
        Self {
            pair,
            config,
            adapters,
            gate,
            aggregator: Aggregator::new(),
            http: reqwest::Client::new(),
            phase: watch::channel(Phase::Startup).0,
        }
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Follow phase changes while `run` owns the monitor.
    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Run until `cancel` fires. Fails if no exchange lists the pair or no
    /// feed delivered a price by the end of warmup.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<RunSummary, EngineError> {
        let started = Instant::now();
        let mut summary = RunSummary {
            elapsed: Duration::ZERO,
            ticks: 0,
            notifications: 0,
        };

        // Startup
        let adapters = std::mem::take(&mut self.adapters);
        let mut feeds: Vec<ExchangeFeed> = adapters
            .into_iter()
            .map(|adapter| ExchangeFeed::new(adapter, self.config.feed.clone(), self.http.clone()))
            .collect();

        info!(pair = %self.pair, exchanges = feeds.len(), "Probing listings");
        let listed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.phase.send_replace(Phase::Shutdown);
                summary.elapsed = started.elapsed();
                return Ok(summary);
            }
            listed = join_all(feeds.iter_mut().map(|f| f.probe_listing())) => listed,
        };
        let feeds: Vec<ExchangeFeed> = feeds
            .into_iter()
            .zip(listed)
            .filter_map(|(feed, is_listed)| is_listed.then_some(feed))
            .collect();

        if feeds.is_empty() {
            self.phase.send_replace(Phase::Shutdown);
            error!(pair = %self.pair, "No exchange lists this pair");
            return Err(EngineError::NoListedExchanges(self.pair.clone()));
        }

        let registry = FeedRegistry::new(feeds.iter().filter_map(|f| f.handle()))?;
        let names: Vec<String> = registry.exchanges().map(|e| e.to_string()).collect();
        info!(pair = %self.pair, "Monitoring {} exchange(s): {}", names.len(), names.join(", "));

        // Warmup
        self.phase.send_replace(Phase::Warmup);
        let feed_cancel = cancel.child_token();
        let mut tasks = JoinSet::new();
        for feed in feeds {
            let exchange = feed.exchange();
            let token = feed_cancel.clone();
            tasks.spawn(async move { (exchange, feed.run(token).await) });
        }

        debug!("Warming up for {:?}", self.config.warmup);
        let cancelled = tokio::select! {
            biased;
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.config.warmup) => false,
        };

        // Steady state
        if !cancelled {
            self.phase.send_replace(Phase::SteadyState);
            let mut ticker = tokio::time::interval(self.config.tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                while let Some(joined) = tasks.try_join_next() {
                    log_feed_exit(joined);
                }

                let now = Utc::now();
                let Some(snapshot) = self.aggregator.latest_spread(&registry.snapshot(), now) else {
                    error!(pair = %self.pair, "No prices received during warmup, pair is unsupported");
                    self.shutdown(&feed_cancel, &mut tasks).await;
                    return Err(EngineError::PairUnsupported(self.pair.clone()));
                };
                summary.ticks += 1;

                self.log_spread(&snapshot, now);
                // A slow sink must not hold up shutdown.
                let report = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    report = self.gate.maybe_notify(&self.pair, &snapshot, now) => report,
                };
                summary.notifications += report.dispatched;
            }
        }

        self.shutdown(&feed_cancel, &mut tasks).await;
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    fn log_spread(&self, snapshot: &SpreadSnapshot, now: chrono::DateTime<Utc>) {
        info!(
            "{} highest: {} {} | lowest: {} {} | difference: {:.8} ({:.4}%)",
            self.pair,
            snapshot.max.exchange,
            snapshot.max.price,
            snapshot.min.exchange,
            snapshot.min.price,
            snapshot.abs_diff,
            snapshot.pct_diff
        );

        for quote in [&snapshot.max, &snapshot.min] {
            let age = (now - quote.observed_at).to_std().unwrap_or_default();
            if age > self.config.stale_warning {
                warn!(
                    exchange = %quote.exchange,
                    age_secs = age.as_secs(),
                    "Quote is stale but still counted"
                );
            }
        }
    }

    /// Cancel every feed, wait up to one tick for them, then abort the rest.
    async fn shutdown(
        &mut self,
        feed_cancel: &CancellationToken,
        tasks: &mut JoinSet<(gossip_core::Exchange, FeedExit)>,
    ) {
        self.phase.send_replace(Phase::Shutdown);
        feed_cancel.cancel();

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                log_feed_exit(joined);
            }
        };
        if tokio::time::timeout(self.config.tick, drain).await.is_err() {
            warn!("{} feed task(s) did not stop in time, aborting", tasks.len());
            tasks.abort_all();
        }
        info!(pair = %self.pair, "Monitor stopped");
    }
}

fn log_feed_exit(
    joined: Result<(gossip_core::Exchange, FeedExit), tokio::task::JoinError>,
) {
    match joined {
        Ok((exchange, FeedExit::SubscriptionRejected(reason))) => {
            warn!(exchange = %exchange, reason = %reason, "Feed stopped permanently")
        }
        Ok((exchange, exit)) => debug!(exchange = %exchange, exit = ?exit, "Feed finished"),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "Feed task panicked"),
    }
}
