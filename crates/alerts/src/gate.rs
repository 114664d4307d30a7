//! Threshold and cooldown gating in front of the notifier sinks.

use crate::notifier::{Notifier, NotifyError};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use gossip_core::{SpreadSnapshot, TradingPair};
use std::time::Duration;
use tracing::{debug, error, info};

/// Configuration for the gate.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Minimum `pct_diff` (percent) that triggers an alert.
    pub threshold_pct: f64,
    /// Minimum time between two successful alerts to the same sink.
    pub cooldown: Duration,
    /// Limit for a single `notify` call; exceeding it counts as a failure.
    pub dispatch_timeout: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold_pct: 1.0,
            cooldown: Duration::from_secs(60),
            dispatch_timeout: Duration::from_secs(10),
        }
    }
}

/// Cooldown bookkeeping for one sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifierState {
    pub cooldown: Duration,
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl NotifierState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_notified_at: None,
        }
    }

    /// A sink that never fired is always eligible.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        match self.last_notified_at {
            None => true,
            Some(last) => (now - last)
                .to_std()
                .map(|elapsed| elapsed >= self.cooldown)
                .unwrap_or(false),
        }
    }
}

/// What one `maybe_notify` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateReport {
    pub dispatched: usize,
    pub failed: usize,
    /// Sinks not called: below threshold or still cooling down.
    pub skipped: usize,
}

struct Sink {
    notifier: Box<dyn Notifier>,
    state: NotifierState,
}

/// Dispatches spread snapshots to sinks, at most once per cooldown each.
pub struct NotificationGate {
    config: GateConfig,
    sinks: Vec<Sink>,
}

impl NotificationGate {
    pub fn new(config: GateConfig, notifiers: Vec<Box<dyn Notifier>>) -> Self {
        let sinks = notifiers
            .into_iter()
            .map(|notifier| Sink {
                notifier,
                state: NotifierState::new(config.cooldown),
            })
            .collect();
        Self { config, sinks }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Cooldown state of the sink called `name`.
    pub fn state(&self, name: &str) -> Option<&NotifierState> {
        self.sinks
            .iter()
            .find(|s| s.notifier.name() == name)
            .map(|s| &s.state)
    }

    /// Send `snapshot` to every eligible sink if the spread reaches the
    /// threshold. Sinks run concurrently; a failure leaves that sink's
    /// cooldown untouched so the next eligible tick retries.
    pub async fn maybe_notify(
        &mut self,
        pair: &TradingPair,
        snapshot: &SpreadSnapshot,
        now: DateTime<Utc>,
    ) -> GateReport {
        if snapshot.pct_diff < self.config.threshold_pct {
            return GateReport {
                skipped: self.sinks.len(),
                ..GateReport::default()
            };
        }

        let dispatch_timeout = self.config.dispatch_timeout;
        let dispatches = self
            .sinks
            .iter()
            .enumerate()
            .filter(|(_, sink)| sink.state.is_eligible(now))
            .map(|(idx, sink)| async move {
                let result =
                    match tokio::time::timeout(dispatch_timeout, sink.notifier.notify(pair, snapshot))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(NotifyError::Timeout(dispatch_timeout)),
                    };
                (idx, result)
            });
        let results = join_all(dispatches).await;

        let mut report = GateReport {
            skipped: self.sinks.len() - results.len(),
            ..GateReport::default()
        };

        for (idx, result) in results {
            let sink = &mut self.sinks[idx];
            match result {
                Ok(()) => {
                    sink.state.last_notified_at = Some(now);
                    report.dispatched += 1;
                    info!(
                        sink = sink.notifier.name(),
                        pct_diff = snapshot.pct_diff,
                        "Notification dispatched"
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    error!(sink = sink.notifier.name(), error = %e, "Failed to send alert");
                }
            }
        }

        if report.skipped > 0 {
            debug!(skipped = report.skipped, "Sinks still cooling down");
        }
        report
    }
}
