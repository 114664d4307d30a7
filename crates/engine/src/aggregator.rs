//! Cross-exchange max/min selection.

use chrono::{DateTime, Utc};
use gossip_core::{SourceQuote, SpreadSnapshot};
use gossip_feeds::FeedReading;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Picks the highest and lowest quoting feed from a registry snapshot.
///
/// Candidates are shuffled before every selection, so when several feeds
/// share the top or bottom price the reported exchange varies between ticks
/// instead of always naming the same one.
#[derive(Debug)]
pub struct Aggregator {
    rng: StdRng,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic tie-breaking, for tests and replays.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Spread across feeds that have published at least one price, or
    /// `None` if none has.
    ///
    /// With more than one live feed, max and min always name different
    /// exchanges, even when every price is equal.
    pub fn latest_spread(
        &mut self,
        readings: &[FeedReading],
        as_of: DateTime<Utc>,
    ) -> Option<SpreadSnapshot> {
        let mut live: Vec<SourceQuote> = readings
            .iter()
            .filter_map(|r| {
                r.latest
                    .map(|obs| SourceQuote::new(r.exchange, r.symbol.clone(), obs))
            })
            .collect();
        if live.is_empty() {
            return None;
        }

        live.shuffle(&mut self.rng);
        let max = live[first_extreme(&live, |a, b| a > b)].clone();
        let mut min_idx = first_extreme(&live, |a, b| a < b);

        // Same feed on both sides means every price is equal.
        if live.len() > 1 {
            while live[min_idx].exchange == max.exchange {
                live.shuffle(&mut self.rng);
                min_idx = first_extreme(&live, |a, b| a < b);
            }
        }
        let min = live[min_idx].clone();

        Some(SpreadSnapshot::new(max, min, as_of))
    }
}

/// Index of the first quote that no later quote beats.
fn first_extreme(quotes: &[SourceQuote], beats: impl Fn(f64, f64) -> bool) -> usize {
    let mut best = 0;
    for (idx, quote) in quotes.iter().enumerate().skip(1) {
        if beats(quote.price, quotes[best].price) {
            best = idx;
        }
    }
    best
}
