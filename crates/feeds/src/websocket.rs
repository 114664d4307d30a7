//! One WebSocket session: connect, subscribe, stream until error or cancel.

use crate::adapter::{ExchangeAdapter, Inbound, SubscriptionAck, WsFrame};
use crate::{ConnectionState, FeedConfig, FeedError, PricePublisher, Publish};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use gossip_core::PriceObservation;
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    Cancelled,
}

/// Borrowed context for a single connection attempt.
pub(crate) struct Session<'a> {
    pub adapter: &'a dyn ExchangeAdapter,
    pub config: &'a FeedConfig,
    pub publisher: &'a PricePublisher,
    pub http: &'a reqwest::Client,
    pub symbol: &'a str,
}

impl Session<'_> {
    /// Run one connection. `on_streaming` is called once the subscription is
    /// confirmed. Returns `Ok` only on cancellation.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        on_streaming: impl FnOnce(),
    ) -> Result<SessionEnd, FeedError> {
        let exchange = self.adapter.exchange();
        self.publisher.set_state(ConnectionState::Connecting);

        let url = self.adapter.endpoint(self.http, self.symbol).await?;
        debug!("{}: Connecting to {}", exchange, url);

        let connect = tokio::time::timeout(self.config.connect_timeout, connect_async(url.as_str()));
        let ws_stream = tokio::select! {
            _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            result = connect => match result {
                Ok(Ok((stream, _response))) => stream,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(FeedError::ConnectionFailed(format!(
                        "connect timed out after {:?}",
                        self.config.connect_timeout
                    )))
                }
            },
        };
        let (mut write, mut read) = ws_stream.split();

        if let Some(subscribe) = self.adapter.subscribe_message(self.symbol) {
            debug!("{}: Subscribing: {}", exchange, subscribe);
            write.send(Message::Text(subscribe)).await?;

            let mut frames = 0usize;
            loop {
                let msg = tokio::select! {
                    _ = cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                    msg = next_message(&mut read, self.config.read_timeout) => msg?,
                };
                let Some(text) = self.frame_text(msg, &mut write).await? else {
                    continue;
                };
                match self.adapter.subscription_ack(&text)? {
                    SubscriptionAck::Confirmed => break,
                    SubscriptionAck::Pending => {
                        self.handle_text(&text, &mut write).await?;
                        frames += 1;
                        if frames >= self.config.max_handshake_frames {
                            return Err(FeedError::Timeout(format!(
                                "no subscription ack after {} frames",
                                frames
                            )));
                        }
                    }
                }
            }
        }

        self.publisher.set_state(ConnectionState::Streaming);
        on_streaming();
        debug!("{}: Streaming {}", exchange, self.symbol);

        let period = self.config.ping_interval;
        let mut keepalive = interval_at(Instant::now() + period, period);
        // Reset by inbound frames only.
        let read_timeout = self.config.read_timeout;
        let idle = sleep(read_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Cancelled);
                }
                _ = &mut idle => return Err(read_timed_out(read_timeout)),
                msg = read.next() => {
                    let msg = received(msg)?;
                    idle.as_mut().reset(Instant::now() + read_timeout);
                    if let Some(text) = self.frame_text(msg, &mut write).await? {
                        self.handle_text(&text, &mut write).await?;
                    }
                }
                _ = keepalive.tick() => {
                    let msg = match self.adapter.keepalive() {
                        Some(ping) => Message::Text(ping),
                        None => Message::Ping(Vec::new()),
                    };
                    trace!("{}: Sending keepalive", exchange);
                    write.send(msg).await?;
                }
            }
        }
    }

    /// Extract the text of a data frame, answering protocol pings on the way.
    async fn frame_text<S>(&self, msg: Message, write: &mut S) -> Result<Option<String>, FeedError>
    where
        S: Sink<Message, Error = WsError> + Unpin,
    {
        match msg {
            Message::Text(text) => self.adapter.decode(WsFrame::Text(text)).map(Some),
            Message::Binary(data) => self.adapter.decode(WsFrame::Binary(data)).map(Some),
            Message::Ping(data) => {
                write.send(Message::Pong(data)).await?;
                Ok(None)
            }
            Message::Pong(_) | Message::Frame(_) => Ok(None),
            Message::Close(frame) => Err(FeedError::Disconnected(match frame {
                Some(frame) => format!("closed by server: {} {}", frame.code, frame.reason),
                None => "closed by server".to_string(),
            })),
        }
    }

    async fn handle_text<S>(&self, text: &str, write: &mut S) -> Result<(), FeedError>
    where
        S: Sink<Message, Error = WsError> + Unpin,
    {
        if text.trim().is_empty() {
            return Err(FeedError::ParseError("empty message".to_string()));
        }

        match self.adapter.parse_message(text)? {
            Inbound::Price { price, observed_at } => {
                let exchange = self.adapter.exchange();
                match PriceObservation::new(price, observed_at) {
                    Some(obs) => {
                        if self.publisher.publish(obs) == Publish::OutOfOrder {
                            debug!("{}: Dropped out-of-order price {} at {}", exchange, price, observed_at);
                        }
                    }
                    None => warn!("{}: Ignoring invalid price {}", exchange, price),
                }
            }
            Inbound::Reply(reply) => write.send(Message::Text(reply)).await?,
            Inbound::Control => {}
        }
        Ok(())
    }
}

/// Next message from the socket, or an error if the stream ends, fails or
/// stays silent for `read_timeout`.
async fn next_message<R>(read: &mut R, read_timeout: Duration) -> Result<Message, FeedError>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    match tokio::time::timeout(read_timeout, read.next()).await {
        Err(_) => Err(read_timed_out(read_timeout)),
        Ok(next) => received(next),
    }
}

fn received(next: Option<Result<Message, WsError>>) -> Result<Message, FeedError> {
    match next {
        None => Err(FeedError::Disconnected("stream ended".to_string())),
        Some(Err(e)) => Err(FeedError::Disconnected(e.to_string())),
        Some(Ok(msg)) => Ok(msg),
    }
}

fn read_timed_out(read_timeout: Duration) -> FeedError {
    FeedError::Timeout(format!("no message received for {:?}", read_timeout))
}
