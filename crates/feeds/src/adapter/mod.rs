//! Exchange adapter trait and implementations.
//!
//! Each exchange has its own listing endpoint, symbol spelling, subscription
//! handshake and ticker format. Adapters hide those differences behind
//! [`ExchangeAdapter`] so that [`crate::ExchangeFeed`] can drive every
//! exchange with the same connection loop.

mod binance;
mod bitfinex;
mod bybit;
mod huobi;
mod kucoin;

pub use binance::BinanceAdapter;
pub use bitfinex::BitfinexAdapter;
pub use bybit::BybitAdapter;
pub use huobi::HuobiAdapter;
pub use kucoin::KucoinAdapter;

use crate::FeedError;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use gossip_core::{Exchange, TradingPair};
use serde::de::DeserializeOwned;

/// Result of a listing probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Pair is tradeable under the given exchange-native symbol.
    Listed(String),
    NotListed,
}

/// How an adapter classifies a frame received while waiting for the
/// subscription to be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAck {
    Confirmed,
    /// Not the ack yet (welcome banners, info events, pings).
    Pending,
}

/// A decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A last-trade price. Validated by the feed before publishing.
    Price { price: f64, observed_at: DateTime<Utc> },
    /// Must be sent back verbatim (application-level pong).
    Reply(String),
    /// Heartbeats, acks, pongs and other frames with nothing to publish.
    Control,
}

/// Raw payload of a data frame.
#[derive(Debug, Clone)]
pub enum WsFrame {
    Text(String),
    Binary(Vec<u8>),
}

/// REST and WebSocket base URLs of an exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub rest: String,
    pub ws: String,
}

impl Endpoints {
    pub fn new(rest: impl Into<String>, ws: impl Into<String>) -> Self {
        Self {
            rest: rest.into(),
            ws: ws.into(),
        }
    }
}

/// Exchange-specific part of a feed.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// Ask the exchange whether the pair is currently tradeable.
    async fn probe_listing(&self, http: &reqwest::Client) -> Result<Listing, FeedError>;

    /// WebSocket URL to connect to. Some exchanges hand out a fresh
    /// URL (with a connect token) per connection.
    async fn endpoint(&self, http: &reqwest::Client, symbol: &str) -> Result<String, FeedError>;

    /// Subscription request sent right after connecting, if any.
    fn subscribe_message(&self, _symbol: &str) -> Option<String> {
        None
    }

    /// Classify a frame received before the subscription is confirmed.
    /// A rejection is returned as [`FeedError::SubscriptionRejected`].
    fn subscription_ack(&self, _text: &str) -> Result<SubscriptionAck, FeedError> {
        Ok(SubscriptionAck::Confirmed)
    }

    /// Turn a data frame into text.
    fn decode(&self, frame: WsFrame) -> Result<String, FeedError> {
        match frame {
            WsFrame::Text(text) => Ok(text),
            WsFrame::Binary(data) => {
                String::from_utf8(data).map_err(|e| FeedError::ParseError(e.to_string()))
            }
        }
    }

    fn parse_message(&self, text: &str) -> Result<Inbound, FeedError>;

    /// Application-level keepalive. `None` means a WebSocket ping is used.
    fn keepalive(&self) -> Option<String> {
        None
    }
}

/// Build the adapter for `exchange` with production endpoints.
pub fn for_exchange(exchange: Exchange, pair: &TradingPair) -> Box<dyn ExchangeAdapter> {
    match exchange {
        Exchange::Binance => Box::new(BinanceAdapter::new(pair)),
        Exchange::Bybit => Box::new(BybitAdapter::new(pair)),
        Exchange::Huobi => Box::new(HuobiAdapter::new(pair)),
        Exchange::Bitfinex => Box::new(BitfinexAdapter::new(pair)),
        Exchange::Kucoin => Box::new(KucoinAdapter::new(pair)),
    }
}

/// Send a request and decode a JSON body, treating non-2xx as a probe failure.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, FeedError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FeedError::ProbeFailed(format!("HTTP {}", status)));
    }
    Ok(response.json::<T>().await?)
}

/// Parse a decimal string price as exchanges send it.
pub(crate) fn parse_price(raw: &str) -> Result<f64, FeedError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| FeedError::ParseError(format!("price {:?}: {}", raw, e)))
}

pub(crate) fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>, FeedError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| FeedError::ParseError(format!("timestamp out of range: {}", ms)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_covers_every_exchange() {
        let pair = TradingPair::new("BTC", "USDT").unwrap();
        for exchange in Exchange::all() {
            assert_eq!(for_exchange(*exchange, &pair).exchange(), *exchange);
        }
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("29313.50").unwrap(), 29313.5);
        assert!(matches!(parse_price("abc"), Err(FeedError::ParseError(_))));
    }

    #[test]
    fn test_millis_to_utc() {
        assert_eq!(millis_to_utc(1_000).unwrap().timestamp(), 1);
        assert!(millis_to_utc(i64::MAX).is_err());
    }
}
