//! Configuration Module
//!
//! Environment-driven configuration for the dashboard service.

mod settings;

pub use settings::{
    AirtableCredentials, ConfigError, DashboardConfig, HoldingsSettings, MarketDataSettings,
    ServerSettings, StreamSettings, DEFAULT_AIRTABLE_API_URL, DEFAULT_AIRTABLE_TABLE,
    DEFAULT_BINANCE_STREAM_URL, DEFAULT_COINGECKO_API_URL,
};
