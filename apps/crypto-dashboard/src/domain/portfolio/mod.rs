//! Portfolio Valuation
//!
//! Pure aggregation over user-entered amounts and a price table:
//! per-currency value, total value, allocation percentages and
//! cross-currency conversion.
//!
//! Amounts are free user input, so every operation saturates at the
//! `Decimal` range instead of overflowing.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::currency::CurrencyCode;
use crate::domain::prices::PriceTable;

/// Amount held per currency. Same layout as a price table.
pub type Amounts = PriceTable;

/// One row of the allocation breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AllocationEntry {
    /// Currency of this row.
    pub currency: CurrencyCode,
    /// Amount held.
    pub amount: Decimal,
    /// USD value (`amount × price`).
    pub value: Decimal,
    /// Share of the total value, in percent. Zero when the total is zero.
    pub percentage: Decimal,
}

/// Full valuation of a set of amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Valuation {
    /// Sum of all values.
    pub total_value: Decimal,
    /// Per-currency breakdown, in display order.
    pub allocation: Vec<AllocationEntry>,
}

/// USD value of one position.
#[must_use]
pub fn position_value(amount: Decimal, price: Decimal) -> Decimal {
    amount.saturating_mul(price)
}

/// Total USD value of all positions.
#[must_use]
pub fn total_value(amounts: &Amounts, prices: &PriceTable) -> Decimal {
    amounts
        .iter()
        .map(|(currency, amount)| position_value(amount, prices.get(currency)))
        .fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Value every position and compute its share of the total.
#[must_use]
pub fn valuation(amounts: &Amounts, prices: &PriceTable) -> Valuation {
    let total = total_value(amounts, prices);
    let hundred = Decimal::ONE_HUNDRED;

    let allocation = amounts
        .iter()
        .map(|(currency, amount)| {
            let value = position_value(amount, prices.get(currency));
            let percentage = if total > Decimal::ZERO {
                value
                    .checked_div(total)
                    .map_or(Decimal::ZERO, |share| share.saturating_mul(hundred))
            } else {
                Decimal::ZERO
            };
            AllocationEntry {
                currency,
                amount,
                value,
                percentage,
            }
        })
        .collect();

    Valuation {
        total_value: total,
        allocation,
    }
}

/// Convert an amount between currencies through their USD prices.
///
/// A zero price is treated as one, so an unpriced currency converts at par.
#[must_use]
pub fn convert(amount: Decimal, from: CurrencyCode, to: CurrencyCode, prices: &PriceTable) -> Decimal {
    let or_one = |price: Decimal| {
        if price.is_zero() { Decimal::ONE } else { price }
    };
    let usd = amount.saturating_mul(or_one(prices.get(from)));
    usd.checked_div(or_one(prices.get(to)))
        .unwrap_or_else(|| saturated(usd.is_sign_negative()))
}

const fn saturated(negative: bool) -> Decimal {
    if negative { Decimal::MIN } else { Decimal::MAX }
}

/// Parse a user-entered amount. Blank or malformed input counts as zero.
#[must_use]
pub fn parse_amount(input: &str) -> Decimal {
    input.trim().parse::<Decimal>().unwrap_or(Decimal::ZERO)
}

/// Format a price for a chart axis: `$65.00k` from one thousand up, else `$12.34`.
#[must_use]
pub fn format_axis_price(value: Decimal) -> String {
    let thousand = Decimal::ONE_THOUSAND;
    if value >= thousand {
        format!("${:.2}k", (value / thousand).round_dp(2))
    } else {
        format!("${:.2}", value.round_dp(2))
    }
}
