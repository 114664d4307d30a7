//! Cross-exchange spread snapshot.

use crate::{Exchange, PriceObservation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One side of a spread: which feed quoted what, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuote {
    pub exchange: Exchange,
    /// Pair in the exchange's own notation.
    pub symbol: String,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

impl SourceQuote {
    pub fn new(exchange: Exchange, symbol: impl Into<String>, obs: PriceObservation) -> Self {
        Self {
            exchange,
            symbol: symbol.into(),
            price: obs.price,
            observed_at: obs.observed_at,
        }
    }
}

/// Highest and lowest quote across live feeds at one aggregation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadSnapshot {
    pub max: SourceQuote,
    pub min: SourceQuote,
    pub abs_diff: f64,
    pub pct_diff: f64,
    pub as_of: DateTime<Utc>,
}

impl SpreadSnapshot {
    pub fn new(max: SourceQuote, min: SourceQuote, as_of: DateTime<Utc>) -> Self {
        let abs_diff = max.price - min.price;
        let pct_diff = percentage_difference(max.price, min.price);
        Self {
            max,
            min,
            abs_diff,
            pct_diff,
            as_of,
        }
    }

    /// True when max and min come from different exchanges.
    pub fn is_cross_exchange(&self) -> bool {
        self.max.exchange != self.min.exchange
    }
}

/// Symmetric percentage difference: `|x - y| / ((x + y) / 2) * 100`.
///
/// Unlike a percentage change this does not depend on which side is the
/// reference. Returns 0 when both values are 0.
pub fn percentage_difference(x: f64, y: f64) -> f64 {
    let mean = (x + y) / 2.0;
    if mean == 0.0 {
        return 0.0;
    }
    (x - y).abs() / mean * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn quote(exchange: Exchange, price: f64) -> SourceQuote {
        let obs = PriceObservation::from_millis(price, 1_654_932_552_785).unwrap();
        SourceQuote::new(exchange, "BTCUSDT", obs)
    }

    #[test]
    fn test_percentage_difference() {
        assert!((percentage_difference(110.0, 90.0) - 20.0).abs() < 1e-12);
        assert!((percentage_difference(90.0, 110.0) - 20.0).abs() < 1e-12);
        assert_eq!(percentage_difference(100.0, 100.0), 0.0);
        assert_eq!(percentage_difference(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_snapshot_metrics() {
        let as_of = Utc.timestamp_millis_opt(1_654_932_553_000).unwrap();
        let snap = SpreadSnapshot::new(
            quote(Exchange::Bybit, 101.0),
            quote(Exchange::Kucoin, 99.5),
            as_of,
        );

        assert!((snap.abs_diff - 1.5).abs() < 1e-12);
        assert!((snap.pct_diff - 1.5 / 100.25 * 100.0).abs() < 1e-12);
        assert!(snap.is_cross_exchange());
        assert_eq!(snap.as_of, as_of);
    }
}
