#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::redundant_clone
    )
)]

//! Crypto Dashboard - Live Price Streaming
//!
//! Streams trade prices for a small set of cryptocurrencies from Binance,
//! keeps the latest and previous price per currency, and serves a JSON
//! dashboard with portfolio valuation, price history and stored holdings.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Currency codes, price tables, portfolio math
//!   - `currency`: Closed currency set and wire-symbol mapping
//!   - `prices`: Price store with current/previous snapshots
//!   - `portfolio`: Valuation, allocation and conversion
//!   - `streaming`: Trade events, connection states, stream errors
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Trade feed, history, spot and holdings interfaces
//!   - `services`: Price subscriptions and dashboard state
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: WebSocket trade feed with reconnection
//!   - `coingecko`: Price history and spot quotes
//!   - `airtable`: Stored holdings
//!   - `config`: Environment configuration
//!   - `http`: Dashboard endpoints
//!
//! # Data Flow
//!
//! ```text
//! Binance WS ──► BinanceTradeClient ──mpsc──► dispatcher ──► PriceStore
//!                                                 │              │
//!                                           callbacks      Dashboard ──► HTTP
//! CoinGecko / Airtable ─────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::currency::{CurrencyCode, SymbolMapping, map_symbol};
pub use domain::prices::{PriceSnapshot, PriceStore, PriceTable, Trend};
pub use domain::streaming::{ConnectionState, StreamError, StreamEvent, TradeEvent};

// Application services
pub use application::ports::TradeFeed;
pub use application::services::{
    Dashboard, PriceSubscriptionService, SubscribeError, SubscriptionHandle,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, DashboardConfig};

// Adapters
pub use infrastructure::airtable::AirtableClient;
pub use infrastructure::binance::{BinanceClientConfig, BinanceTradeClient};
pub use infrastructure::coingecko::CoinGeckoClient;
pub use infrastructure::http::{DashboardServer, ServerError, router};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
