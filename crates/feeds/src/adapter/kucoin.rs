use async_trait::async_trait;
use chrono::Utc;
use gossip_core::{Exchange, TradingPair};
use serde::Deserialize;

use super::{
    fetch_json, millis_to_utc, parse_price, Endpoints, ExchangeAdapter, Inbound, Listing,
    SubscriptionAck,
};
use crate::FeedError;

const REST_URL: &str = "https://api.kucoin.com";
const SUCCESS_CODE: &str = "200000";

/// KuCoin spot `/market/ticker` topic.
///
/// Public connections need a token from `bullet-public`, which also names
/// the instance server to connect to, so the WebSocket URL is resolved per
/// connection.
pub struct KucoinAdapter {
    symbol: String,
    endpoints: Endpoints,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    enable_trading: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulletToken {
    token: String,
    instance_servers: Vec<InstanceServer>,
}

#[derive(Debug, Deserialize)]
struct InstanceServer {
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum KucoinFrame {
    Welcome {},
    Ack {},
    Pong {},
    Message {
        data: TickerData,
    },
    Error {
        #[serde(default)]
        code: serde_json::Value,
        #[serde(default)]
        data: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TickerData {
    price: String,
    time: i64,
}

impl KucoinAdapter {
    pub fn new(pair: &TradingPair) -> Self {
        Self {
            symbol: pair.dashed(),
            endpoints: Endpoints::new(REST_URL, ""),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }
}

#[async_trait]
impl ExchangeAdapter for KucoinAdapter {
    fn exchange(&self) -> Exchange {
        Exchange::Kucoin
    }

    async fn probe_listing(&self, http: &reqwest::Client) -> Result<Listing, FeedError> {
        let request = http.get(format!("{}/api/v1/symbols", self.endpoints.rest));
        let response: ApiResponse<Vec<SymbolInfo>> = fetch_json(request).await?;

        if response.code != SUCCESS_CODE {
            return Err(FeedError::ProbeFailed(format!("code {}", response.code)));
        }

        let trading = response
            .data
            .unwrap_or_default()
            .iter()
            .any(|s| s.symbol == self.symbol && s.enable_trading);
        Ok(if trading {
            Listing::Listed(self.symbol.clone())
        } else {
            Listing::NotListed
        })
    }

    async fn endpoint(&self, http: &reqwest::Client, _symbol: &str) -> Result<String, FeedError> {
        let request = http.post(format!("{}/api/v1/bullet-public", self.endpoints.rest));
        let response: ApiResponse<BulletToken> = fetch_json(request)
            .await
            .map_err(|e| FeedError::ConnectionFailed(format!("connect token: {}", e)))?;

        let token = match response.data {
            Some(token) if response.code == SUCCESS_CODE => token,
            _ => {
                return Err(FeedError::ConnectionFailed(format!(
                    "connect token: code {}",
                    response.code
                )))
            }
        };
        let server = token
            .instance_servers
            .first()
            .ok_or_else(|| FeedError::ConnectionFailed("no instance servers".to_string()))?;

        let mut url = url::Url::parse(&server.endpoint)?;
        url.query_pairs_mut()
            .append_pair("token", &token.token)
            .append_pair("connectId", &Utc::now().timestamp_millis().to_string());
        Ok(url.to_string())
    }

    fn subscribe_message(&self, symbol: &str) -> Option<String> {
        Some(format!(
            r#"{{"id":"{}","type":"subscribe","topic":"/market/ticker:{}","privateChannel":false,"response":true}}"#,
            Utc::now().timestamp_millis(),
            symbol
        ))
    }

    fn subscription_ack(&self, text: &str) -> Result<SubscriptionAck, FeedError> {
        match serde_json::from_str::<KucoinFrame>(text) {
            Ok(KucoinFrame::Ack {}) => Ok(SubscriptionAck::Confirmed),
            Ok(KucoinFrame::Error { code, data }) => Err(FeedError::SubscriptionRejected(
                format!("{} (code {})", data, code),
            )),
            _ => Ok(SubscriptionAck::Pending),
        }
    }

    fn parse_message(&self, text: &str) -> Result<Inbound, FeedError> {
        match serde_json::from_str::<KucoinFrame>(text)? {
            KucoinFrame::Message { data } => Ok(Inbound::Price {
                price: parse_price(&data.price)?,
                observed_at: millis_to_utc(data.time)?,
            }),
            KucoinFrame::Error { code, data } => {
                Err(FeedError::ParseError(format!("{} (code {})", data, code)))
            }
            KucoinFrame::Welcome {} | KucoinFrame::Ack {} | KucoinFrame::Pong {} | KucoinFrame::Other => {
                Ok(Inbound::Control)
            }
        }
    }

    fn keepalive(&self) -> Option<String> {
        Some(format!(
            r#"{{"id":"{}","type":"ping"}}"#,
            Utc::now().timestamp_millis()
        ))
    }
}
