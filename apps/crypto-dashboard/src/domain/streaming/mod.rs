//! Trade Streaming Types
//!
//! Codec-agnostic types exchanged between a trade feed and the
//! subscription dispatcher: decoded trades, connection lifecycle states
//! and structured error kinds.
//!
//! # Connection Lifecycle
//!
//! ```text
//! Connecting ──► Open ──► Reconnecting ──► Connecting ...
//!      │           │            │
//!      └───────────┴────────────┴──► Closed | Failed   (terminal)
//! ```

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

/// One executed trade, decoded from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    /// Exchange wire symbol, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Trade price in the quote currency.
    pub price: Decimal,
}

impl TradeEvent {
    /// Create a trade event.
    #[must_use]
    pub fn new(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
        }
    }
}

/// Lifecycle state of a trade stream connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport handshake or subscribe request in progress.
    Connecting,
    /// Subscribed and receiving trades.
    Open,
    /// Waiting out a backoff delay before the next connection attempt.
    Reconnecting {
        /// Reconnection attempt number, starting at 1.
        attempt: u32,
    },
    /// Closed on request. Terminal.
    Closed,
    /// Gave up after exhausting reconnection attempts. Terminal.
    Failed {
        /// Last error seen before giving up.
        reason: String,
    },
}

impl ConnectionState {
    /// Whether no further transitions are possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed { .. })
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Closed => "closed",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Error kinds reported by a trade stream.
///
/// Transport failures and remote closes are retried by the feed; parse
/// failures drop only the offending message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Transport-level failure (connect, read, write or timeout).
    #[error("transport error: {reason}")]
    Transport {
        /// Human-readable cause.
        reason: String,
    },

    /// The remote end closed the connection.
    #[error("connection closed by remote")]
    Closed,

    /// A message could not be decoded, or carried a malformed price.
    #[error("malformed message: {reason}")]
    Parse {
        /// Human-readable cause.
        reason: String,
    },

    /// The exchange rejected a control request.
    #[error("request rejected ({code}): {message}")]
    Rejected {
        /// Exchange error code.
        code: i64,
        /// Exchange error message.
        message: String,
    },
}

impl StreamError {
    /// Build a transport error from any displayable cause.
    pub fn transport(reason: impl fmt::Display) -> Self {
        Self::Transport {
            reason: reason.to_string(),
        }
    }

    /// Build a parse error from any displayable cause.
    pub fn parse(reason: impl fmt::Display) -> Self {
        Self::Parse {
            reason: reason.to_string(),
        }
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Closed => "closed",
            Self::Parse { .. } => "parse",
            Self::Rejected { .. } => "rejected",
        }
    }

    /// Whether the error ends the current connection.
    #[must_use]
    pub const fn is_connection_loss(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Closed)
    }
}

/// Event pushed from a trade feed to its subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Connection state changed.
    State(ConnectionState),
    /// A trade was decoded.
    Trade(TradeEvent),
    /// An error occurred.
    Error(StreamError),
}
