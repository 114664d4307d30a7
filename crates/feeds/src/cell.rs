//! Latest-price cell shared between one feed task and its readers.
//!
//! Each feed owns a [`PricePublisher`]; everything else holds a cloned
//! [`FeedHandle`]. Both sides sit on `tokio::sync::watch`, so a reader always
//! sees a whole observation and never a half-written one, and only the feed
//! task can write.

use crate::ConnectionState;
use gossip_core::{Exchange, PriceObservation};
use tokio::sync::watch;

/// Outcome of [`PricePublisher::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    Accepted,
    /// Timestamp older than the stored observation; the cell is unchanged.
    OutOfOrder,
}

/// Write side of a feed's cells.
#[derive(Debug)]
pub struct PricePublisher {
    latest: watch::Sender<Option<PriceObservation>>,
    state: watch::Sender<ConnectionState>,
}

impl Default for PricePublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl PricePublisher {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        let (state, _) = watch::channel(ConnectionState::Probing);
        Self { latest, state }
    }

    /// Replace the stored observation unless `obs` is older than it.
    ///
    /// Equal timestamps are accepted so that several trades reported in the
    /// same millisecond still move the price.
    pub fn publish(&self, obs: PriceObservation) -> Publish {
        let mut outcome = Publish::OutOfOrder;
        self.latest.send_if_modified(|slot| match slot {
            Some(current) if obs.observed_at < current.observed_at => false,
            _ => {
                *slot = Some(obs);
                outcome = Publish::Accepted;
                true
            }
        });
        outcome
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn latest(&self) -> Option<PriceObservation> {
        *self.latest.borrow()
    }

    /// Create a read handle for this feed.
    pub fn handle(&self, exchange: Exchange, symbol: impl Into<String>) -> FeedHandle {
        FeedHandle {
            exchange,
            symbol: symbol.into(),
            latest: self.latest.subscribe(),
            state: self.state.subscribe(),
        }
    }
}

/// Read side of a feed's cells. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    exchange: Exchange,
    symbol: String,
    latest: watch::Receiver<Option<PriceObservation>>,
    state: watch::Receiver<ConnectionState>,
}

impl FeedHandle {
    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Pair in the exchange's own notation.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn latest(&self) -> Option<PriceObservation> {
        *self.latest.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }
}
