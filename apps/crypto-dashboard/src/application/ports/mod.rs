//! Port Interfaces
//!
//! Contracts between the dashboard core and its external data sources.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`TradeFeed`]: streaming trade source (Binance)
//! - [`HistoricalPricePort`]: 30-day daily price history (CoinGecko)
//! - [`SpotPricePort`]: one-shot USD spot quotes (CoinGecko)
//! - [`HoldingsPort`]: stored portfolio holdings (Airtable)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::currency::CurrencyCode;
use crate::domain::prices::PriceTable;
use crate::domain::streaming::StreamEvent;

// =============================================================================
// Trade Feed
// =============================================================================

/// Streaming source of trade events.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeFeed: Send + Sync {
    /// Stream trades for the given wire symbols into `events`.
    ///
    /// Runs until `cancel` fires, the receiver is dropped, or the feed gives
    /// up reconnecting. State changes and errors are reported as events;
    /// nothing is returned to the caller.
    async fn stream(
        &self,
        wire_symbols: Vec<String>,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    );
}

// =============================================================================
// Historical Prices
// =============================================================================

/// One point of a price history series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricePoint {
    /// Observation time.
    pub date: DateTime<Utc>,
    /// USD price.
    pub price: Decimal,
}

/// Source of daily price history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoricalPricePort: Send + Sync {
    /// Fetch the last 30 days of daily prices for a currency.
    ///
    /// Failures degrade to an empty series; they are logged and counted by
    /// the adapter, never returned.
    async fn historical_prices(&self, currency: CurrencyCode) -> Vec<PricePoint>;
}

// =============================================================================
// Spot Prices
// =============================================================================

/// Source of current USD spot prices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpotPricePort: Send + Sync {
    /// Fetch spot prices for every tracked currency.
    ///
    /// Failures degrade to an all-zero table.
    async fn spot_prices(&self) -> PriceTable;
}

// =============================================================================
// Holdings
// =============================================================================

/// One holding row from the external portfolio store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortfolioHolding {
    /// Currency code as stored (not restricted to tracked currencies).
    pub currency: String,
    /// Amount held; `None` when the stored value is not numeric.
    pub amount: Option<Decimal>,
}

/// Holdings store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HoldingsError {
    /// Required credential is not configured. Not retried.
    #[error("{0} is not set in the environment variables")]
    Configuration(&'static str),

    /// The store rejected the credentials.
    #[error(
        "failed to authorize with the holdings store; check AIRTABLE_TOKEN and AIRTABLE_BASE_ID"
    )]
    Unauthorized,

    /// Any other request or decoding failure.
    #[error("failed to fetch portfolio holdings: {0}")]
    Fetch(String),
}

impl HoldingsError {
    /// Remediation text shown next to the error.
    #[must_use]
    pub const fn remediation(&self) -> &'static str {
        match self {
            Self::Configuration(_) | Self::Unauthorized => {
                "Set AIRTABLE_TOKEN and AIRTABLE_BASE_ID in the environment or .env file and restart the dashboard."
            }
            Self::Fetch(_) => "Check the holdings store configuration and the dashboard logs for details.",
        }
    }
}

/// Source of stored portfolio holdings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HoldingsPort: Send + Sync {
    /// Fetch every stored holding.
    async fn portfolio_holdings(&self) -> Result<Vec<PortfolioHolding>, HoldingsError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_variable() {
        let err = HoldingsError::Configuration("AIRTABLE_TOKEN");
        assert_eq!(
            err.to_string(),
            "AIRTABLE_TOKEN is not set in the environment variables"
        );
        assert!(err.remediation().contains("AIRTABLE_BASE_ID"));
    }

    #[test]
    fn price_point_serializes_iso_date() {
        let point = PricePoint {
            date: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            price: Decimal::new(3_712_345, 2),
        };
        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["date"], "2023-11-14T22:13:20Z");
        assert_eq!(json["price"], "37123.45");
    }
}
