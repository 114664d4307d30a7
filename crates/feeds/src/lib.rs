//! Real-time last-trade price feeds from exchanges.
//!
//! Each listed exchange gets one [`ExchangeFeed`] task that owns a
//! WebSocket connection and writes into a single-value price cell.
//! Readers get a [`FeedHandle`] per feed, grouped in a [`FeedRegistry`].
//!
//! ## Architecture
//!
//! - `adapter/` - Exchange-specific listing probes, handshakes and parsing
//! - `feed` - Probe, then reconnect loop around one WebSocket session
//! - `cell` - Latest-price cell (single writer, many readers)
//! - `registry` - Snapshot view over every listed feed

pub mod adapter;
pub mod cell;
pub mod error;
pub mod feed;
pub mod manager;
pub mod registry;
mod websocket;

pub use adapter::{
    for_exchange, BinanceAdapter, BitfinexAdapter, BybitAdapter, Endpoints, ExchangeAdapter,
    HuobiAdapter, Inbound, KucoinAdapter, Listing, SubscriptionAck, WsFrame,
};
pub use cell::*;
pub use error::*;
pub use feed::*;
pub use manager::*;
pub use registry::*;
