//! Dashboard State
//!
//! Everything the display surface reads: the live price subscription,
//! user-entered amounts (held in memory only), price history and stored
//! holdings.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;

use super::subscription::SubscriptionHandle;
use crate::application::ports::{
    HistoricalPricePort, HoldingsError, HoldingsPort, PortfolioHolding, PricePoint,
};
use crate::domain::currency::CurrencyCode;
use crate::domain::portfolio::{self, Amounts, Valuation};
use crate::domain::prices::{PriceSnapshot, Trend};
use crate::domain::streaming::ConnectionState;

/// Price line for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteView {
    /// Currency.
    pub currency: CurrencyCode,
    /// Latest price.
    pub price: Decimal,
    /// Price before the latest update.
    pub previous: Decimal,
    /// Direction of the latest update.
    pub trend: Trend,
}

/// Live price board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceBoard {
    /// Stream connection state.
    pub connection: ConnectionState,
    /// One line per tracked currency.
    pub quotes: Vec<QuoteView>,
}

impl PriceBoard {
    /// Build a board from a snapshot.
    #[must_use]
    pub fn from_snapshot(connection: ConnectionState, snapshot: &PriceSnapshot) -> Self {
        let quotes = CurrencyCode::all()
            .iter()
            .map(|&currency| QuoteView {
                currency,
                price: snapshot.current.get(currency),
                previous: snapshot.previous.get(currency),
                trend: snapshot.trend(currency),
            })
            .collect();
        Self { connection, quotes }
    }
}

/// Shared dashboard state.
pub struct Dashboard {
    subscription: SubscriptionHandle,
    amounts: RwLock<Amounts>,
    history: Arc<dyn HistoricalPricePort>,
    holdings: Arc<dyn HoldingsPort>,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("subscription", &self.subscription)
            .field("amounts", &*self.amounts.read())
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Create dashboard state around a live subscription.
    #[must_use]
    pub fn new(
        subscription: SubscriptionHandle,
        history: Arc<dyn HistoricalPricePort>,
        holdings: Arc<dyn HoldingsPort>,
    ) -> Self {
        Self {
            subscription,
            amounts: RwLock::new(Amounts::zeroed()),
            history,
            holdings,
        }
    }

    /// Connection state of the price stream.
    #[must_use]
    pub fn connection(&self) -> ConnectionState {
        self.subscription.state()
    }

    /// Live price board.
    #[must_use]
    pub fn prices(&self) -> PriceBoard {
        PriceBoard::from_snapshot(self.subscription.state(), &self.subscription.read())
    }

    /// User-entered amounts.
    #[must_use]
    pub fn amounts(&self) -> Amounts {
        *self.amounts.read()
    }

    /// Update amounts from raw text input. Unlisted currencies are unchanged.
    pub fn set_amounts(&self, input: &BTreeMap<CurrencyCode, String>) -> Amounts {
        let mut amounts = self.amounts.write();
        for (currency, raw) in input {
            amounts.set(*currency, portfolio::parse_amount(raw));
        }
        *amounts
    }

    /// Value the entered amounts at live prices.
    #[must_use]
    pub fn valuation(&self) -> Valuation {
        let prices = self.subscription.read().current;
        portfolio::valuation(&self.amounts(), &prices)
    }

    /// Convert an amount between currencies at live prices.
    #[must_use]
    pub fn convert(&self, amount: Decimal, from: CurrencyCode, to: CurrencyCode) -> Decimal {
        portfolio::convert(amount, from, to, &self.subscription.read().current)
    }

    /// 30-day history for a currency; empty when unavailable.
    pub async fn history(&self, currency: CurrencyCode) -> Vec<PricePoint> {
        self.history.historical_prices(currency).await
    }

    /// Stored holdings from the external portfolio store.
    ///
    /// # Errors
    ///
    /// Returns the store's error so the holdings panel can show it locally.
    pub async fn holdings(&self) -> Result<Vec<PortfolioHolding>, HoldingsError> {
        self.holdings.portfolio_holdings().await
    }

    /// Stop the price subscription.
    pub fn shutdown(&self) {
        self.subscription.dispose();
    }
}
