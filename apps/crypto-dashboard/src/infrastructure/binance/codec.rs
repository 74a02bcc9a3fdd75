//! Stream Codec
//!
//! Decodes Binance text frames into [`StreamMessage`] values and converts
//! trade messages into domain [`TradeEvent`]s.
//!
//! Messages are discriminated by shape:
//! - an `e` field carries the event type (`trade`, ...)
//! - a `result` field with an `id` acknowledges a control request
//! - an `error` object rejects a control request
//!
//! Combined-stream envelopes (`{"stream": ..., "data": {...}}`) are
//! unwrapped before discrimination.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use super::messages::{ErrorBody, StreamMessage, TradeMessage};
use crate::domain::streaming::TradeEvent;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is valid JSON but not a recognizable message.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// Trade price is not a decimal number.
    #[error("invalid price {raw:?} for {symbol}")]
    InvalidPrice {
        /// Wire symbol of the trade.
        symbol: String,
        /// Raw price text.
        raw: String,
    },
}

/// JSON codec for the Binance trade stream.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not JSON or has an unknown shape.
    pub fn decode(&self, text: &str) -> Result<StreamMessage, CodecError> {
        let mut value: Value = serde_json::from_str(text.trim())?;

        if value.get("stream").is_some()
            && let Some(data) = value.get_mut("data").map(Value::take)
        {
            value = data;
        }

        if !value.is_object() {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON object, got: {}",
                truncate(text)
            )));
        }

        if let Some(event_type) = value.get("e").and_then(Value::as_str) {
            return match event_type {
                "trade" => Ok(StreamMessage::Trade(serde_json::from_value(value)?)),
                other => Ok(StreamMessage::Other(other.to_string())),
            };
        }

        if let Some(error) = value.get("error") {
            let error: ErrorBody = serde_json::from_value(error.clone())?;
            let id = value.get("id").and_then(Value::as_u64);
            return Ok(StreamMessage::Error { id, error });
        }

        if value.get("result").is_some()
            && let Some(id) = value.get("id").and_then(Value::as_u64)
        {
            return Ok(StreamMessage::Ack { id });
        }

        Err(CodecError::InvalidFormat(format!(
            "unrecognized message: {}",
            truncate(text)
        )))
    }

    /// Encode a control request.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode<T: serde::Serialize>(&self, value: &T) -> Result<String, CodecError> {
        Ok(serde_json::to_string(value)?)
    }
}

impl TradeMessage {
    /// Parse the price text into a [`TradeEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidPrice`] when the price is not a decimal.
    pub fn into_event(self) -> Result<TradeEvent, CodecError> {
        match Decimal::from_str(self.price.trim()) {
            Ok(price) => Ok(TradeEvent::new(self.symbol, price)),
            Err(_) => Err(CodecError::InvalidPrice {
                symbol: self.symbol,
                raw: self.price,
            }),
        }
    }
}

fn truncate(text: &str) -> &str {
    let end = text
        .char_indices()
        .nth(50)
        .map_or(text.len(), |(index, _)| index);
    &text[..end]
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn decodes_trade_event() {
        let codec = JsonCodec::new();
        let msg = codec
            .decode(r#"{"e":"trade","s":"BTCUSDT","p":"65000.12"}"#)
            .unwrap();

        let StreamMessage::Trade(trade) = msg else {
            panic!("expected trade, got {msg:?}");
        };
        let event = trade.into_event().unwrap();
        assert_eq!(event.symbol, "BTCUSDT");
        assert_eq!(event.price, dec!(65000.12));
    }

    #[test]
    fn malformed_price_is_reported() {
        let codec = JsonCodec::new();
        let StreamMessage::Trade(trade) = codec
            .decode(r#"{"e":"trade","s":"BTCUSDT","p":"abc"}"#)
            .unwrap()
        else {
            panic!("expected trade");
        };

        let err = trade.into_event().unwrap_err();
        assert!(matches!(err, CodecError::InvalidPrice { ref raw, .. } if raw == "abc"));
        assert_eq!(err.to_string(), r#"invalid price "abc" for BTCUSDT"#);
    }

    #[test]
    fn decodes_subscription_ack() {
        let codec = JsonCodec::new();
        assert_eq!(
            codec.decode(r#"{"result":null,"id":3}"#).unwrap(),
            StreamMessage::Ack { id: 3 }
        );
    }

    #[test]
    fn decodes_rejection() {
        let codec = JsonCodec::new();
        let msg = codec
            .decode(r#"{"error":{"code":2,"msg":"Invalid request"},"id":1}"#)
            .unwrap();
        let StreamMessage::Error { id, error } = msg else {
            panic!("expected error");
        };
        assert_eq!(id, Some(1));
        assert_eq!(error.code, 2);
        assert_eq!(error.msg, "Invalid request");
    }

    #[test]
    fn unwraps_combined_stream_envelope() {
        let codec = JsonCodec::new();
        let msg = codec
            .decode(r#"{"stream":"ethusdt@trade","data":{"e":"trade","s":"ETHUSDT","p":"3000"}}"#)
            .unwrap();
        assert!(matches!(msg, StreamMessage::Trade(ref t) if t.symbol == "ETHUSDT"));
    }

    #[test]
    fn other_events_are_passed_through() {
        let codec = JsonCodec::new();
        assert_eq!(
            codec.decode(r#"{"e":"aggTrade","s":"BTCUSDT"}"#).unwrap(),
            StreamMessage::Other("aggTrade".to_string())
        );
    }

    #[test]
    fn rejects_garbage() {
        let codec = JsonCodec::new();
        assert!(matches!(codec.decode("not json"), Err(CodecError::Json(_))));
        assert!(matches!(
            codec.decode("[1,2,3]"),
            Err(CodecError::InvalidFormat(_))
        ));
        assert!(matches!(
            codec.decode(r#"{"hello":"world"}"#),
            Err(CodecError::InvalidFormat(_))
        ));
    }

    #[test]
    fn trade_without_price_is_a_json_error() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode(r#"{"e":"trade","s":"BTCUSDT"}"#),
            Err(CodecError::Json(_))
        ));
    }
}
