use async_trait::async_trait;
use gossip_core::{Exchange, TradingPair};
use serde::Deserialize;

use super::{
    fetch_json, millis_to_utc, parse_price, Endpoints, ExchangeAdapter, Inbound, Listing,
    SubscriptionAck,
};
use crate::FeedError;

const REST_URL: &str = "https://api.bybit.com";
const WS_URL: &str = "wss://stream.bybit.com/v5/public/spot";

/// Bybit v5 public spot stream, `tickers.{SYMBOL}` topic.
pub struct BybitAdapter {
    symbol: String,
    endpoints: Endpoints,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentsInfo {
    ret_code: i64,
    #[serde(default)]
    ret_msg: String,
    result: Option<InstrumentsResult>,
}

#[derive(Debug, Deserialize)]
struct InstrumentsResult {
    #[serde(default)]
    list: Vec<Instrument>,
}

#[derive(Debug, Deserialize)]
struct Instrument {
    symbol: String,
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BybitFrame {
    Ticker(TickerMessage),
    Op(OpMessage),
}

#[derive(Debug, Deserialize)]
struct TickerMessage {
    #[serde(rename = "topic")]
    _topic: String,
    ts: i64,
    data: TickerData,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    #[serde(rename = "lastPrice")]
    last_price: String,
}

/// Responses to `subscribe` and `ping` requests.
/// e.g. `{"success":true,"ret_msg":"pong","conn_id":"...","op":"pong"}`
#[derive(Debug, Deserialize)]
struct OpMessage {
    op: String,
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    ret_msg: String,
}

impl BybitAdapter {
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
impl ExchangeAdapter for BybitAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    async fn probe_listing(&self, http: &reqwest::Client) -> Result<Listing, FeedError> {
        let request = http
            .get(format!("{}/v5/market/instruments-info", self.endpoints.rest))
            .query(&[("category", "spot"), ("symbol", self.symbol.as_str())]);
        let info: InstrumentsInfo = fetch_json(request).await?;

        if info.ret_code != 0 {
            return Err(FeedError::ProbeFailed(format!(
                "retCode {}: {}",
                info.ret_code, info.ret_msg
            )));
        }

        let trading = info
            .result
            .map(|r| r.list)
            .unwrap_or_default()
            .iter()
            .any(|i| i.symbol == self.symbol && i.status == "Trading");
        Ok(if trading {
            Listing::Listed(self.symbol.clone())
        } else {
            Listing::NotListed
        })
    }

    async fn endpoint(&self, _http: &reqwest::Client, _symbol: &str) -> Result<String, FeedError> {
        Ok(self.endpoints.ws.clone())
    }

    fn subscribe_message(&self, symbol: &str) -> Option<String> {
        Some(format!(r#"{{"op":"subscribe","args":["tickers.{}"]}}"#, symbol))
    }

    fn subscription_ack(&self, text: &str) -> Result<SubscriptionAck, FeedError> {
        let Ok(msg) = serde_json::from_str::<OpMessage>(text) else {
            return Ok(SubscriptionAck::Pending);
        };
        match (msg.op.as_str(), msg.success) {
            ("subscribe", Some(true)) => Ok(SubscriptionAck::Confirmed),
            ("subscribe", _) => Err(FeedError::SubscriptionRejected(msg.ret_msg)),
            _ => Ok(SubscriptionAck::Pending),
        }
    }

    fn parse_message(&self, text: &str) -> Result<Inbound, FeedError> {
        match serde_json::from_str::<BybitFrame>(text)? {
            BybitFrame::Ticker(msg) => Ok(Inbound::Price {
                price: parse_price(&msg.data.last_price)?,
                observed_at: millis_to_utc(msg.ts)?,
            }),
            BybitFrame::Op(_) => Ok(Inbound::Control),
        }
    }

    fn keepalive(&self) -> Option<String> {
        Some(r#"{"op":"ping"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(rest: &str) -> BybitAdapter {
        let pair = TradingPair::new("BTC", "USDT").unwrap();
        BybitAdapter::new(&pair).with_endpoints(Endpoints::new(rest, "ws://127.0.0.1:1"))
    }

    #[test]
    fn test_subscribe_message() {
        let msg = adapter("http://unused").subscribe_message("BTCUSDT").unwrap();
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value, json!({"op": "subscribe", "args": ["tickers.BTCUSDT"]}));
    }

    #[test]
    fn test_subscription_ack() {
        let adapter = adapter("http://unused");
        let ok = r#"{"success":true,"ret_msg":"","conn_id":"abc","req_id":"","op":"subscribe"}"#;
        assert_eq!(adapter.subscription_ack(ok).unwrap(), SubscriptionAck::Confirmed);

        let rejected = r#"{"success":false,"ret_msg":"Invalid symbol :[tickers.BTCUSDX]","conn_id":"abc","op":"subscribe"}"#;
        match adapter.subscription_ack(rejected) {
            Err(FeedError::SubscriptionRejected(msg)) => assert!(msg.contains("Invalid symbol")),
            other => panic!("expected rejection, got {:?}", other),
        }

        let pong = r#"{"success":true,"ret_msg":"pong","conn_id":"abc","op":"pong"}"#;
        assert_eq!(adapter.subscription_ack(pong).unwrap(), SubscriptionAck::Pending);
    }

    #[test]
    fn test_parse_ticker() {
        let json = r#"{"topic":"tickers.BTCUSDT","ts":1673853746003,"type":"snapshot","cs":2588407389,"data":{"symbol":"BTCUSDT","lastPrice":"21109.77","highPrice24h":"21426.99","lowPrice24h":"20575","prevPrice24h":"20704.93","volume24h":"6780.866843","turnover24h":"141946527.22907118","price24hPcnt":"0.0196","usdIndexPrice":"21120.2400136"}}"#;

        match adapter("http://unused").parse_message(json).unwrap() {
            Inbound::Price { price, observed_at } => {
                assert_eq!(price, 21109.77);
                assert_eq!(observed_at.timestamp_millis(), 1_673_853_746_003);
            }
            other => panic!("expected price, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_pong_is_control() {
        let pong = r#"{"success":true,"ret_msg":"pong","conn_id":"abc","op":"pong"}"#;
        assert_eq!(adapter("http://unused").parse_message(pong).unwrap(), Inbound::Control);
        assert_eq!(
            adapter("http://unused").keepalive().as_deref(),
            Some(r#"{"op":"ping"}"#)
        );
    }

    #[tokio::test]
    async fn test_probe_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v5/market/instruments-info"))
            .and(query_param("category", "spot"))
            .and(query_param("symbol", "BTCUSDT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retCode": 0,
                "retMsg": "OK",
                "result": {
                    "category": "spot",
                    "list": [{"symbol": "BTCUSDT", "baseCoin": "BTC", "quoteCoin": "USDT", "status": "Trading"}]
                }
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
    async fn test_probe_empty_list_is_not_listed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retCode": 0,
                "retMsg": "OK",
                "result": {"category": "", "list": []}
            })))
            .mount(&server)
            .await;

        let listing = adapter(&server.uri())
            .probe_listing(&reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(listing, Listing::NotListed);
    }

    #[tokio::test]
    async fn test_probe_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "retCode": 10001,
                "retMsg": "params error",
                "result": {}
            })))
            .mount(&server)
            .await;

        let result = adapter(&server.uri())
            .probe_listing(&reqwest::Client::new())
            .await;
        assert!(matches!(result, Err(FeedError::ProbeFailed(_))));
    }
}
