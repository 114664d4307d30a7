//! Exchange identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Exchange identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Exchange {
    Binance,
    Bybit,
    Huobi,
    Bitfinex,
    Kucoin,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown exchange: {0}")]
pub struct UnknownExchange(pub String);

impl Exchange {
    pub fn as_str(self) -> &'static str {
        match self {
            Exchange::Binance => "Binance",
            Exchange::Bybit => "Bybit",
            Exchange::Huobi => "Huobi",
            Exchange::Bitfinex => "Bitfinex",
            Exchange::Kucoin => "KuCoin",
        }
    }

    /// Every exchange with a streaming adapter.
    pub fn all() -> &'static [Exchange] {
        &[
            Exchange::Binance,
            Exchange::Bybit,
            Exchange::Huobi,
            Exchange::Bitfinex,
            Exchange::Kucoin,
        ]
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exchange {
    type Err = UnknownExchange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Exchange::all()
            .iter()
            .copied()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownExchange(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_from_str_ignores_case() {
        assert_eq!("binance".parse::<Exchange>(), Ok(Exchange::Binance));
        assert_eq!(" KUCOIN ".parse::<Exchange>(), Ok(Exchange::Kucoin));
        assert_eq!("HuObI".parse::<Exchange>(), Ok(Exchange::Huobi));
        assert!("ftx".parse::<Exchange>().is_err());
    }

    #[test]
    fn test_exchange_display() {
        assert_eq!(Exchange::Kucoin.to_string(), "KuCoin");
        assert_eq!(Exchange::Bitfinex.to_string(), "Bitfinex");
    }
}
