//! Read-only view over every listed feed.

use crate::{ConnectionState, FeedHandle, RegistryError};
use chrono::{DateTime, Utc};
use gossip_core::{Exchange, PriceObservation};
use std::time::Duration;

/// One feed's state and latest price, copied at snapshot time.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedReading {
    pub exchange: Exchange,
    pub symbol: String,
    pub state: ConnectionState,
    pub latest: Option<PriceObservation>,
}

impl FeedReading {
    /// Age of the latest observation, `None` before the first price.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.latest.map(|obs| obs.age(now))
    }
}

/// Fixed set of feeds for one run, at most one per exchange.
#[derive(Debug, Clone)]
pub struct FeedRegistry {
    feeds: Vec<FeedHandle>,
}

impl FeedRegistry {
    pub fn new(handles: impl IntoIterator<Item = FeedHandle>) -> Result<Self, RegistryError> {
        let mut feeds: Vec<FeedHandle> = Vec::new();
        for handle in handles {
            if feeds.iter().any(|f| f.exchange() == handle.exchange()) {
                return Err(RegistryError::DuplicateExchange(handle.exchange()));
            }
            feeds.push(handle);
        }
        Ok(Self { feeds })
    }

    /// Read every cell once. Each reading is internally consistent; readings
    /// of different feeds may straddle a concurrent update.
    pub fn snapshot(&self) -> Vec<FeedReading> {
        self.feeds
            .iter()
            .map(|f| FeedReading {
                exchange: f.exchange(),
                symbol: f.symbol().to_string(),
                state: f.state(),
                latest: f.latest(),
            })
            .collect()
    }

    pub fn get(&self, exchange: Exchange) -> Option<&FeedHandle> {
        self.feeds.iter().find(|f| f.exchange() == exchange)
    }

    pub fn exchanges(&self) -> impl Iterator<Item = Exchange> + '_ {
        self.feeds.iter().map(|f| f.exchange())
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}
