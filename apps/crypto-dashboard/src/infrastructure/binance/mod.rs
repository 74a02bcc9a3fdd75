//! Binance WebSocket Adapter
//!
//! Streams spot trades for the dashboard's tracked pairs (JSON codec).

pub mod codec;
pub mod messages;
pub mod reconnect;
pub mod stream;

pub use codec::{CodecError, JsonCodec};
pub use messages::{ErrorBody, StreamMessage, StreamMethod, StreamRequest, TradeMessage};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use stream::{BinanceClientConfig, BinanceTradeClient};
