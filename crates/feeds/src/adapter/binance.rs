use async_trait::async_trait;
use gossip_core::{Exchange, TradingPair};
use reqwest::StatusCode;
use serde::Deserialize;

use super::{millis_to_utc, parse_price, Endpoints, ExchangeAdapter, Inbound, Listing};
use crate::FeedError;

const REST_URL: &str = "https://api.binance.com";
const WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Binance spot. One raw stream per connection, so there is no
/// subscription message; the stream name is part of the URL.
pub struct BinanceAdapter {
    symbol: String,
    endpoints: Endpoints,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct MiniTicker {
    #[serde(rename = "E")]
    event_time: i64,
    #[serde(rename = "c")]
    close: String,
}

impl BinanceAdapter {
    pub fn new(pair: &TradingPair) -> Self {
        Self {
            symbol: pair.merged(),
            endpoints: Endpoints::new(REST_URL, WS_URL),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    async fn probe_listing(&self, http: &reqwest::Client) -> Result<Listing, FeedError> {
        let response = http
            .get(format!("{}/api/v3/exchangeInfo", self.endpoints.rest))
            .query(&[("symbol", self.symbol.as_str())])
            .send()
            .await?;

        // Unknown symbols are answered with 400 / code -1121.
        if response.status() == StatusCode::BAD_REQUEST {
            return Ok(Listing::NotListed);
        }
        if !response.status().is_success() {
            return Err(FeedError::ProbeFailed(format!("HTTP {}", response.status())));
        }

        let info: ExchangeInfo = response.json().await?;
        let trading = info
            .symbols
            .iter()
            .any(|s| s.symbol == self.symbol && s.status == "TRADING");
        Ok(if trading {
            Listing::Listed(self.symbol.clone())
        } else {
            Listing::NotListed
        })
    }

    async fn endpoint(&self, _http: &reqwest::Client, symbol: &str) -> Result<String, FeedError> {
        Ok(format!(
            "{}/{}@miniTicker",
            self.endpoints.ws,
            symbol.to_lowercase()
        ))
    }

    fn parse_message(&self, text: &str) -> Result<Inbound, FeedError> {
        let ticker: MiniTicker = serde_json::from_str(text)?;
        Ok(Inbound::Price {
            price: parse_price(&ticker.close)?,
            observed_at: millis_to_utc(ticker.event_time)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(rest: &str) -> BinanceAdapter {
        let pair = TradingPair::new("BTC", "USDT").unwrap();
        BinanceAdapter::new(&pair).with_endpoints(Endpoints::new(rest, "ws://127.0.0.1:1/ws"))
    }

    #[test]
    fn test_parse_mini_ticker() {
        let json = r#"{"e":"24hrMiniTicker","E":1654932552785,"s":"BTCUSDT","c":"29313.50000000","o":"29000.0","h":"29500.0","l":"28900.0","v":"100.0","q":"2900000.0"}"#;

        let inbound = adapter("http://unused").parse_message(json).unwrap();
        match inbound {
            Inbound::Price { price, observed_at } => {
                assert_eq!(price, 29313.5);
                assert_eq!(observed_at.timestamp_millis(), 1_654_932_552_785);
            }
            other => panic!("expected price, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            adapter("http://unused").parse_message("not json"),
            Err(FeedError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_endpoint_uses_lowercase_stream() {
        let url = adapter("http://unused")
            .endpoint(&reqwest::Client::new(), "BTCUSDT")
            .await
            .unwrap();
        assert_eq!(url, "ws://127.0.0.1:1/ws/btcusdt@miniTicker");
    }

    #[tokio::test]
    async fn test_probe_trading_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/exchangeInfo"))
            .and(query_param("symbol", "BTCUSDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timezone": "UTC",
                "symbols": [{"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC"}]
            })))
            .mount(&server)
            .await;

        let listing = adapter(&server.uri())
            .probe_listing(&reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(listing, Listing::Listed("BTCUSDT".to_string()));
    }

    #[tokio::test]
    async fn test_probe_halted_or_unknown_symbol() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/exchangeInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "symbols": [{"symbol": "BTCUSDT", "status": "BREAK"}]
            })))
            .mount(&server)
            .await;
        let http = reqwest::Client::new();
        assert_eq!(
            adapter(&server.uri()).probe_listing(&http).await.unwrap(),
            Listing::NotListed
        );

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": -1121, "msg": "Invalid symbol."
            })))
            .mount(&server)
            .await;
        assert_eq!(
            adapter(&server.uri()).probe_listing(&http).await.unwrap(),
            Listing::NotListed
        );
    }

    #[tokio::test]
    async fn test_probe_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = adapter(&server.uri())
            .probe_listing(&reqwest::Client::new())
            .await;
        assert!(matches!(result, Err(FeedError::ProbeFailed(_))));
    }
}
