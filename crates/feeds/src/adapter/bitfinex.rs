use async_trait::async_trait;
use chrono::Utc;
use gossip_core::{Exchange, TradingPair};
use serde_json::Value;

use super::{fetch_json, Endpoints, ExchangeAdapter, Inbound, Listing, SubscriptionAck};
use crate::FeedError;

const REST_URL: &str = "https://api-pub.bitfinex.com";
const WS_URL: &str = "wss://api-pub.bitfinex.com/ws/2";

/// Info event code asking clients to reconnect (server restart).
const INFO_RECONNECT: i64 = 20051;

/// Index of LAST_PRICE in a ticker array
/// `[BID, BID_SIZE, ASK, ASK_SIZE, DAILY_CHANGE, DAILY_CHANGE_RELATIVE, LAST_PRICE, VOLUME, HIGH, LOW]`.
const LAST_PRICE_INDEX: usize = 6;

/// Bitfinex v2 public ticker channel.
///
/// Bitfinex spells USDT as `UST` and separates assets longer than three
/// letters with a colon (`BTCUST` but `AVAX:UST`). Ticker updates carry no
/// timestamp, so receive time is used.
pub struct BitfinexAdapter {
    candidates: Vec<String>,
    endpoints: Endpoints,
}

impl BitfinexAdapter {
    pub fn new(pair: &TradingPair) -> Self {
        let base = native_asset(pair.base());
        let quote = native_asset(pair.quote());
        Self {
            candidates: vec![format!("{}{}", base, quote), format!("{}:{}", base, quote)],
            endpoints: Endpoints::new(REST_URL, WS_URL),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

fn native_asset(asset: &str) -> &str {
    match asset {
        "USDT" => "UST",
        other => other,
    }
}

#[async_trait]
impl ExchangeAdapter for BitfinexAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Bitfinex
    }

    async fn probe_listing(&self, http: &reqwest::Client) -> Result<Listing, FeedError> {
        let request = http.get(format!("{}/v2/conf/pub:list:pair:exchange", self.endpoints.rest));
        let lists: Vec<Vec<String>> = fetch_json(request).await?;
        let pairs = lists.into_iter().next().unwrap_or_default();

        Ok(self
            .candidates
            .iter()
            .find(|c| pairs.contains(c))
            .map(|c| Listing::Listed(c.clone()))
            .unwrap_or(Listing::NotListed))
    }

    async fn endpoint(&self, _http: &reqwest::Client, _symbol: &str) -> Result<String, FeedError> {
        Ok(self.endpoints.ws.clone())
    }

    fn subscribe_message(&self, symbol: &str) -> Option<String> {
        Some(format!(
            r#"{{"event":"subscribe","channel":"ticker","symbol":"t{}"}}"#,
            symbol
        ))
    }

    fn subscription_ack(&self, text: &str) -> Result<SubscriptionAck, FeedError> {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            return Ok(SubscriptionAck::Pending);
        };
        match value.get("event").and_then(Value::as_str) {
            Some("subscribed") => Ok(SubscriptionAck::Confirmed),
            Some("error") => Err(FeedError::SubscriptionRejected(event_message(&value))),
            _ => Ok(SubscriptionAck::Pending),
        }
    }

    fn parse_message(&self, text: &str) -> Result<Inbound, FeedError> {
        let value: Value = serde_json::from_str(text)?;
        match value {
            Value::Array(items) => parse_channel_update(&items),
            Value::Object(_) => match value.get("event").and_then(Value::as_str) {
                Some("info") if value.get("code").and_then(Value::as_i64) == Some(INFO_RECONNECT) => {
                    Err(FeedError::Disconnected("server requested reconnect".to_string()))
                }
                Some("error") => Err(FeedError::ParseError(event_message(&value))),
                Some(_) => Ok(Inbound::Control),
                None => Err(FeedError::ParseError(format!("unexpected object: {}", text))),
            },
            _ => Err(FeedError::ParseError(format!("unexpected frame: {}", text))),
        }
    }

    fn keepalive(&self) -> Option<String> {
        Some(format!(
            r#"{{"event":"ping","cid":{}}}"#,
            Utc::now().timestamp_millis()
        ))
    }
}

/// `[CHANNEL_ID, "hb"]` or `[CHANNEL_ID, [ticker fields]]`.
fn parse_channel_update(items: &[Value]) -> Result<Inbound, FeedError> {
    match items.get(1) {
        Some(Value::String(s)) if s == "hb" => Ok(Inbound::Control),
        Some(Value::Array(fields)) => {
            let price = fields
                .get(LAST_PRICE_INDEX)
                .and_then(Value::as_f64)
                .ok_or_else(|| FeedError::ParseError("ticker without LAST_PRICE".to_string()))?;
            Ok(Inbound::Price {
                price,
                observed_at: Utc::now(),
            })
        }
        _ => Err(FeedError::ParseError(format!(
            "unexpected channel update: {:?}",
            items
        ))),
    }
}

fn event_message(value: &Value) -> String {
    let msg = value.get("msg").and_then(Value::as_str).unwrap_or("unknown");
    match value.get("code").and_then(Value::as_i64) {
        Some(code) => format!("{} (code {})", msg, code),
        None => msg.to_string(),
    }
}
