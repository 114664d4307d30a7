//! Price observations published by exchange feeds.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The latest price seen on one exchange and when the exchange reported it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

impl PriceObservation {
    /// Create an observation. Returns `None` unless the price is finite and positive.
    pub fn new(price: f64, observed_at: DateTime<Utc>) -> Option<Self> {
        if price.is_finite() && price > 0.0 {
            Some(Self { price, observed_at })
        } else {
            None
        }
    }

    /// Create an observation from an exchange timestamp in milliseconds.
    pub fn from_millis(price: f64, timestamp_ms: i64) -> Option<Self> {
        let observed_at = Utc.timestamp_millis_opt(timestamp_ms).single()?;
        Self::new(price, observed_at)
    }

    /// Time elapsed since the observation, zero if it lies in the future.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.observed_at).to_std().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observation_rejects_invalid_prices() {
        let now = Utc::now();
        assert!(PriceObservation::new(0.0, now).is_none());
        assert!(PriceObservation::new(-1.0, now).is_none());
        assert!(PriceObservation::new(f64::NAN, now).is_none());
        assert!(PriceObservation::new(f64::INFINITY, now).is_none());
        assert!(PriceObservation::new(29313.5, now).is_some());
    }

    #[test]
    fn test_observation_from_millis() {
        let obs = PriceObservation::from_millis(29313.5, 1_654_932_552_785).unwrap();
        assert_eq!(obs.observed_at.timestamp_millis(), 1_654_932_552_785);
        assert_eq!(obs.price, 29313.5);
    }

    #[test]
    fn test_observation_age() {
        let obs = PriceObservation::from_millis(1.0, 1_000).unwrap();
        let now = Utc.timestamp_millis_opt(3_500).unwrap();
        assert_eq!(obs.age(now), Duration::from_millis(2_500));

        let before = Utc.timestamp_millis_opt(0).unwrap();
        assert_eq!(obs.age(before), Duration::ZERO);
    }
}
