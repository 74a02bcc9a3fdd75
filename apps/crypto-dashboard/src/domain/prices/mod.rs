//! Price Reconciliation
//!
//! Holds the current and previous USD price of every tracked currency.
//! Each update shifts `current` into `previous` before writing the new
//! value, so the display layer can render a trend arrow per currency.
//!
//! # Consistency
//!
//! Both tables live behind a single lock. Readers receive a cloned
//! [`PriceSnapshot`], never a live reference, and always see a pair where
//! `previous` is the value that immediately preceded the visible `current`.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::domain::currency::CurrencyCode;

// =============================================================================
// Price Table
// =============================================================================

/// Price per currency, indexed by [`CurrencyCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTable([Decimal; CurrencyCode::COUNT]);

impl PriceTable {
    /// Table with every price set to zero.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self([Decimal::ZERO; CurrencyCode::COUNT])
    }

    /// Starting prices: zero for volatile assets, one for the USD-pegged quote.
    #[must_use]
    pub fn initial() -> Self {
        let mut table = Self::zeroed();
        table.set(CurrencyCode::Usdt, Decimal::ONE);
        table
    }

    /// Starting prices overlaid with nonzero spot quotes.
    ///
    /// The quote currency keeps its pegged initial value whatever the spot
    /// source reports.
    #[must_use]
    pub fn seeded_from_spot(spot: &Self) -> Self {
        let mut table = Self::initial();
        for (currency, price) in spot.iter() {
            if !currency.is_quote() && !price.is_zero() {
                table.set(currency, price);
            }
        }
        table
    }

    /// Price of a currency.
    #[must_use]
    pub const fn get(&self, currency: CurrencyCode) -> Decimal {
        self.0[currency.index()]
    }

    /// Overwrite the price of a currency.
    pub const fn set(&mut self, currency: CurrencyCode, price: Decimal) {
        self.0[currency.index()] = price;
    }

    /// Iterate `(currency, price)` pairs in display order.
    pub fn iter(&self) -> impl Iterator<Item = (CurrencyCode, Decimal)> + '_ {
        CurrencyCode::all().iter().map(|c| (*c, self.get(*c)))
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::initial()
    }
}

impl FromIterator<(CurrencyCode, Decimal)> for PriceTable {
    fn from_iter<I: IntoIterator<Item = (CurrencyCode, Decimal)>>(iter: I) -> Self {
        let mut table = Self::zeroed();
        for (currency, price) in iter {
            table.set(currency, price);
        }
        table
    }
}

impl Serialize for PriceTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(CurrencyCode::COUNT))?;
        for (currency, price) in self.iter() {
            map.serialize_entry(currency.as_str(), &price)?;
        }
        map.end()
    }
}

// =============================================================================
// Trend
// =============================================================================

/// Direction of the last price change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// Current price is above the previous one.
    Up,
    /// Current price is below the previous one.
    Down,
    /// No change.
    Unchanged,
}

impl Trend {
    /// Compare a current price against the previous one.
    #[must_use]
    pub fn between(previous: Decimal, current: Decimal) -> Self {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => Self::Up,
            std::cmp::Ordering::Less => Self::Down,
            std::cmp::Ordering::Equal => Self::Unchanged,
        }
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Immutable point-in-time read of the price store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PriceSnapshot {
    /// Latest applied prices.
    pub current: PriceTable,
    /// Prices immediately before the latest update of each currency.
    pub previous: PriceTable,
}

impl PriceSnapshot {
    /// Trend of a currency between its previous and current price.
    #[must_use]
    pub fn trend(&self, currency: CurrencyCode) -> Trend {
        Trend::between(self.previous.get(currency), self.current.get(currency))
    }
}

// =============================================================================
// Price Store
// =============================================================================

/// Current/previous price table owned by one subscription.
#[derive(Debug, Default)]
pub struct PriceStore {
    book: RwLock<PriceSnapshot>,
}

impl PriceStore {
    /// Create a store with initial prices in both tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with known prices (e.g. a REST spot quote).
    ///
    /// Seeded values appear in both tables so no trend is implied.
    #[must_use]
    pub fn seeded(prices: PriceTable) -> Self {
        Self {
            book: RwLock::new(PriceSnapshot {
                current: prices,
                previous: prices,
            }),
        }
    }

    /// Apply a new price: shift current into previous, then set current.
    pub fn apply(&self, currency: CurrencyCode, price: Decimal) {
        let mut book = self.book.write();
        let last = book.current.get(currency);
        book.previous.set(currency, last);
        book.current.set(currency, price);
    }

    /// Read a consistent snapshot of both tables.
    #[must_use]
    pub fn read(&self) -> PriceSnapshot {
        *self.book.read()
    }
}
