//! Trading pair notation.
//!
//! Exchanges spell the same market differently (`BTCUSDT`, `btcusdt`,
//! `BTC-USDT`, `BTC/USDT`). A [`TradingPair`] keeps the canonical base and
//! quote assets and renders whichever form an adapter needs.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PairError {
    #[error("{0} asset must not be empty")]
    Empty(&'static str),
    #[error("invalid character in asset {0:?}")]
    InvalidAsset(String),
}

/// A base/quote pair, stored upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    base: String,
    quote: String,
}

impl TradingPair {
    pub fn new(base: &str, quote: &str) -> Result<Self, PairError> {
        Ok(Self {
            base: normalize_asset(base, "base")?,
            quote: normalize_asset(quote, "quote")?,
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// `BTCUSDT`
    pub fn merged(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// `btcusdt`
    pub fn merged_lower(&self) -> String {
        self.merged().to_lowercase()
    }

    /// `BTC-USDT`
    pub fn dashed(&self) -> String {
        format!("{}-{}", self.base, self.quote)
    }

    /// `BTC/USDT`
    pub fn slashed(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

fn normalize_asset(asset: &str, side: &'static str) -> Result<String, PairError> {
    let asset = asset.trim();
    if asset.is_empty() {
        return Err(PairError::Empty(side));
    }
    if !asset.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PairError::InvalidAsset(asset.to_string()));
    }
    Ok(asset.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_notations() {
        let pair = TradingPair::new("eth", "UsDt").unwrap();
        assert_eq!(pair.base(), "ETH");
        assert_eq!(pair.quote(), "USDT");
        assert_eq!(pair.merged(), "ETHUSDT");
        assert_eq!(pair.merged_lower(), "ethusdt");
        assert_eq!(pair.dashed(), "ETH-USDT");
        assert_eq!(pair.slashed(), "ETH/USDT");
        assert_eq!(pair.to_string(), "ETHUSDT");
    }

    #[test]
    fn test_pair_rejects_bad_assets() {
        assert_eq!(TradingPair::new(" ", "USDT"), Err(PairError::Empty("base")));
        assert_eq!(TradingPair::new("BTC", ""), Err(PairError::Empty("quote")));
        assert!(matches!(
            TradingPair::new("BTC-", "USDT"),
            Err(PairError::InvalidAsset(_))
        ));
    }
}
