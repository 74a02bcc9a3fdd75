//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports, plus configuration,
//! the HTTP surface and observability.

/// Binance WebSocket trade feed.
pub mod binance;

/// CoinGecko price history and spot quotes.
pub mod coingecko;

/// Airtable holdings store.
pub mod airtable;

/// Environment-driven configuration.
pub mod config;

/// Dashboard HTTP endpoints.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry trace export.
pub mod telemetry;
