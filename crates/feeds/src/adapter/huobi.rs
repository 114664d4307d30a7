use async_trait::async_trait;
use flate2::read::GzDecoder;
use gossip_core::{Exchange, TradingPair};
use serde::Deserialize;
use std::io::Read;

use super::{
    fetch_json, millis_to_utc, Endpoints, ExchangeAdapter, Inbound, Listing, SubscriptionAck,
    WsFrame,
};
use crate::FeedError;

const REST_URL: &str = "https://api.huobi.pro";
const WS_URL: &str = "wss://api.huobi.pro/ws";

/// Huobi (HTX) spot market stream. Every server frame is gzip-compressed
/// binary, and the server pings with `{"ping": n}` which must be echoed
/// back as `{"pong": n}` or the connection is dropped.
pub struct HuobiAdapter {
    symbol: String,
    endpoints: Endpoints,
}

#[derive(Debug, Deserialize)]
struct SymbolsResponse {
    status: String,
    #[serde(default)]
    data: Vec<SymbolSettings>,
}

#[derive(Debug, Deserialize)]
struct SymbolSettings {
    sc: String,
    state: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HuobiFrame {
    Ping {
        ping: i64,
    },
    Tick {
        #[serde(rename = "ch")]
        _ch: String,
        ts: i64,
        tick: Tick,
    },
    Status {
        status: String,
        #[serde(rename = "err-msg", default)]
        err_msg: String,
    },
}

#[derive(Debug, Deserialize)]
struct Tick {
    #[serde(rename = "lastPrice")]
    last_price: f64,
}

impl HuobiAdapter {
    pub fn new(pair: &TradingPair) -> Self {
        Self {
            symbol: pair.merged_lower(),
            endpoints: Endpoints::new(REST_URL, WS_URL),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait]
impl ExchangeAdapter for HuobiAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Huobi
    }

    async fn probe_listing(&self, http: &reqwest::Client) -> Result<Listing, FeedError> {
        let request = http.get(format!("{}/v2/settings/common/symbols", self.endpoints.rest));
        let response: SymbolsResponse = fetch_json(request).await?;

        if response.status != "ok" {
            return Err(FeedError::ProbeFailed(format!("status {}", response.status)));
        }

        let online = response
            .data
            .iter()
            .any(|s| s.sc == self.symbol && s.state == "online");
        Ok(if online {
            Listing::Listed(self.symbol.clone())
        } else {
            Listing::NotListed
        })
    }

    async fn endpoint(&self, _http: &reqwest::Client, _symbol: &str) -> Result<String, FeedError> {
        Ok(self.endpoints.ws.clone())
    }

    fn subscribe_message(&self, symbol: &str) -> Option<String> {
        Some(format!(
            r#"{{"sub":"market.{}.ticker","id":"{}"}}"#,
            symbol, symbol
        ))
    }

    fn subscription_ack(&self, text: &str) -> Result<SubscriptionAck, FeedError> {
        match serde_json::from_str::<HuobiFrame>(text) {
            Ok(HuobiFrame::Status { status, .. }) if status == "ok" => {
                Ok(SubscriptionAck::Confirmed)
            }
            Ok(HuobiFrame::Status { err_msg, .. }) => {
                Err(FeedError::SubscriptionRejected(err_msg))
            }
            _ => Ok(SubscriptionAck::Pending),
        }
    }

    fn decode(&self, frame: WsFrame) -> Result<String, FeedError> {
        match frame {
            WsFrame::Text(text) => Ok(text),
            WsFrame::Binary(data) => {
                let mut text = String::new();
                GzDecoder::new(data.as_slice())
                    .read_to_string(&mut text)
                    .map_err(|e| FeedError::ParseError(format!("gzip: {}", e)))?;
                Ok(text)
            }
        }
    }

    fn parse_message(&self, text: &str) -> Result<Inbound, FeedError> {
        match serde_json::from_str::<HuobiFrame>(text)? {
            HuobiFrame::Ping { ping } => Ok(Inbound::Reply(format!(r#"{{"pong":{}}}"#, ping))),
            HuobiFrame::Tick { ts, tick, .. } => Ok(Inbound::Price {
                price: tick.last_price,
                observed_at: millis_to_utc(ts)?,
            }),
            HuobiFrame::Status { status, .. } if status == "ok" => Ok(Inbound::Control),
            HuobiFrame::Status { status, err_msg } => {
                Err(FeedError::ParseError(format!("status {}: {}", status, err_msg)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use serde_json::json;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(rest: &str) -> HuobiAdapter {
        let pair = TradingPair::new("BTC", "USDT").unwrap();
        HuobiAdapter::new(&pair).with_endpoints(Endpoints::new(rest, "ws://127.0.0.1:1/ws"))
    }

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_gzip_frame() {
        let adapter = adapter("http://unused");
        let text = adapter
            .decode(WsFrame::Binary(gzip(r#"{"ping":1492420473027}"#)))
            .unwrap();
        assert_eq!(text, r#"{"ping":1492420473027}"#);

        assert!(matches!(
            adapter.decode(WsFrame::Binary(vec![1, 2, 3])),
            Err(FeedError::ParseError(_))
        ));
    }

    #[test]
    fn test_ping_is_answered_with_pong() {
        let inbound = adapter("http://unused")
            .parse_message(r#"{"ping":1492420473027}"#)
            .unwrap();
        assert_eq!(inbound, Inbound::Reply(r#"{"pong":1492420473027}"#.to_string()));
    }

    #[test]
    fn test_parse_ticker() {
        let json = r#"{"ch":"market.btcusdt.ticker","ts":1630982370526,"tick":{"open":51732,"high":52785.64,"low":51000,"close":52735.63,"amount":13259.24137056181,"vol":687640987.4125315,"count":448737,"bid":52732.88,"bidSize":0.036,"ask":52732.89,"askSize":0.583653,"lastPrice":52735.63,"lastSize":0.03}}"#;

        match adapter("http://unused").parse_message(json).unwrap() {
            Inbound::Price { price, observed_at } => {
                assert_eq!(price, 52735.63);
                assert_eq!(observed_at.timestamp_millis(), 1_630_982_370_526);
            }
            other => panic!("expected price, got {:?}", other),
        }
    }

    #[test]
    fn test_subscription_ack() {
        let adapter = adapter("http://unused");
        assert_eq!(
            adapter.subscribe_message("btcusdt").unwrap(),
            r#"{"sub":"market.btcusdt.ticker","id":"btcusdt"}"#
        );

        let ok = r#"{"id":"btcusdt","status":"ok","subbed":"market.btcusdt.ticker","ts":1489474081631}"#;
        assert_eq!(adapter.subscription_ack(ok).unwrap(), SubscriptionAck::Confirmed);

        let ping = r#"{"ping":1492420473027}"#;
        assert_eq!(adapter.subscription_ack(ping).unwrap(), SubscriptionAck::Pending);

        let err = r#"{"status":"error","ts":1494301904959,"id":"btcusdt","err-code":"bad-request","err-msg":"invalid topic market.btcusdx.ticker"}"#;
        match adapter.subscription_ack(err) {
            Err(FeedError::SubscriptionRejected(msg)) => assert!(msg.contains("invalid topic")),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_probe_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/settings/common/symbols"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "data": [
                    {"sc": "ethusdt", "state": "online", "bc": "eth", "qc": "usdt"},
                    {"sc": "btcusdt", "state": "online", "bc": "btc", "qc": "usdt"},
                    {"sc": "xyzusdt", "state": "offline", "bc": "xyz", "qc": "usdt"}
                ]
            })))
            .mount(&server)
            .await;
        let http = reqwest::Client::new();

        assert_eq!(
            adapter(&server.uri()).probe_listing(&http).await.unwrap(),
            Listing::Listed("btcusdt".to_string())
        );

        let pair = TradingPair::new("XYZ", "USDT").unwrap();
        let offline = HuobiAdapter::new(&pair)
            .with_endpoints(Endpoints::new(server.uri(), "ws://127.0.0.1:1/ws"));
        assert_eq!(offline.probe_listing(&http).await.unwrap(), Listing::NotListed);
    }
}
