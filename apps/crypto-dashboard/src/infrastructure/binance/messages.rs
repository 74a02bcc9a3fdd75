//! Binance WebSocket Message Types
//!
//! Wire format types for the Binance spot trade stream.
//!
//! # Control Messages
//!
//! ```json
//! {"method": "SUBSCRIBE", "params": ["btcusdt@trade"], "id": 1}
//! {"result": null, "id": 1}
//! {"error": {"code": 2, "msg": "Invalid request"}, "id": 1}
//! ```
//!
//! # Trade Event
//!
//! ```json
//! {"e": "trade", "E": 1700000000000, "s": "BTCUSDT", "t": 12345,
//!  "p": "65000.12", "q": "0.010", "T": 1700000000000, "m": true}
//! ```
//!
//! Prices and quantities arrive as decimal strings.

use serde::{Deserialize, Serialize};

use crate::domain::currency::trade_channel;

/// Control method sent to the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamMethod {
    /// Start receiving the listed channels.
    Subscribe,
}

/// Control request: `{"method": ..., "params": [...], "id": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamRequest {
    /// Control method.
    pub method: StreamMethod,
    /// Channel names, e.g. `btcusdt@trade`.
    pub params: Vec<String>,
    /// Request identifier echoed in the acknowledgment.
    pub id: u64,
}

impl StreamRequest {
    /// Subscribe to the trade channel of each wire symbol.
    #[must_use]
    pub fn subscribe_trades(wire_symbols: &[String], id: u64) -> Self {
        Self {
            method: StreamMethod::Subscribe,
            params: wire_symbols.iter().map(|s| trade_channel(s)).collect(),
            id,
        }
    }
}

/// Raw trade event as sent by the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TradeMessage {
    /// Event type (always `trade`).
    #[serde(rename = "e")]
    pub event_type: String,

    /// Event time, epoch milliseconds.
    #[serde(rename = "E", default)]
    pub event_time: Option<i64>,

    /// Wire symbol.
    #[serde(rename = "s")]
    pub symbol: String,

    /// Trade identifier.
    #[serde(rename = "t", default)]
    pub trade_id: Option<u64>,

    /// Price as a decimal string.
    #[serde(rename = "p")]
    pub price: String,

    /// Quantity as a decimal string.
    #[serde(rename = "q", default)]
    pub quantity: Option<String>,

    /// Whether the buyer was the maker.
    #[serde(rename = "m", default)]
    pub buyer_is_maker: Option<bool>,
}

/// Error body of a rejected control request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    /// Exchange error code.
    pub code: i64,
    /// Exchange error message.
    pub msg: String,
}

/// Any message received from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// A trade event.
    Trade(TradeMessage),
    /// A control request was accepted.
    Ack {
        /// Request identifier.
        id: u64,
    },
    /// A control request was rejected.
    Error {
        /// Request identifier, when the exchange echoed one.
        id: Option<u64>,
        /// Rejection details.
        error: ErrorBody,
    },
    /// Any other event type; ignored.
    Other(String),
}
