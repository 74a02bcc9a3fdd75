//! Currency Codes and Symbol Mapping
//!
//! The dashboard tracks a closed set of currencies. Exchange feeds identify
//! instruments by wire symbols such as `BTCUSDT` (base code followed by the
//! quote code); this module maps those back to [`CurrencyCode`] values.
//!
//! # Mapping Rules
//!
//! - The trailing quote suffix (`USDT`) is stripped to obtain the base code.
//! - A pair quoted against itself (`USDTUSDT`) is [`SymbolMapping::Ignored`]:
//!   the quote currency is pegged and must never be repriced by the stream.
//! - Anything else outside the closed set is [`SymbolMapping::Unrecognized`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Quote currency every wire symbol is denominated in.
pub const QUOTE_CURRENCY: &str = "USDT";

/// Suffix that turns a lowercased wire symbol into a trade channel name.
pub const TRADE_CHANNEL_SUFFIX: &str = "@trade";

// =============================================================================
// Currency Code
// =============================================================================

/// A currency tracked by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    /// Bitcoin.
    Btc,
    /// Ethereum.
    Eth,
    /// Tether, the USD-pegged quote currency.
    Usdt,
}

impl CurrencyCode {
    /// Number of currencies in the closed set.
    pub const COUNT: usize = 3;

    /// All currencies, in display order.
    #[must_use]
    pub const fn all() -> &'static [Self; Self::COUNT] {
        &[Self::Btc, Self::Eth, Self::Usdt]
    }

    /// Uppercase currency code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Eth => "ETH",
            Self::Usdt => "USDT",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Btc => "Bitcoin",
            Self::Eth => "Ethereum",
            Self::Usdt => "Tether",
        }
    }

    /// Dense index used by fixed-size price tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Btc => 0,
            Self::Eth => 1,
            Self::Usdt => 2,
        }
    }

    /// Whether this is the quote currency itself.
    #[must_use]
    pub const fn is_quote(self) -> bool {
        matches!(self, Self::Usdt)
    }

    /// Wire symbol quoted in USDT, e.g. `BTCUSDT`.
    #[must_use]
    pub fn wire_symbol(self) -> String {
        format!("{}{QUOTE_CURRENCY}", self.as_str())
    }

    /// Trade channel name for the stream subscription, e.g. `btcusdt@trade`.
    #[must_use]
    pub fn trade_channel(self) -> String {
        trade_channel(&self.wire_symbol())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown currency code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported currency: {0}")]
pub struct UnknownCurrency(pub String);

impl FromStr for CurrencyCode {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BTC" => Ok(Self::Btc),
            "ETH" => Ok(Self::Eth),
            "USDT" => Ok(Self::Usdt),
            other => Err(UnknownCurrency(other.to_string())),
        }
    }
}

// =============================================================================
// Symbol Mapper
// =============================================================================

/// Result of mapping a wire symbol to a tracked currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolMapping {
    /// The symbol prices this currency.
    Currency(CurrencyCode),
    /// The quote currency traded against itself; must not touch the store.
    Ignored,
    /// Not a USDT pair of a tracked currency.
    Unrecognized,
}

/// Strip the quote suffix from a wire symbol.
///
/// Returns `None` when the symbol is not quoted in USDT or the base is empty.
#[must_use]
pub fn base_code(wire_symbol: &str) -> Option<&str> {
    wire_symbol
        .strip_suffix(QUOTE_CURRENCY)
        .filter(|base| !base.is_empty())
}

/// Map a wire symbol to the currency it prices.
#[must_use]
pub fn map_symbol(wire_symbol: &str) -> SymbolMapping {
    let Some(base) = base_code(wire_symbol) else {
        return SymbolMapping::Unrecognized;
    };

    if base == QUOTE_CURRENCY {
        return SymbolMapping::Ignored;
    }

    match base.parse::<CurrencyCode>() {
        Ok(currency) if base == currency.as_str() => SymbolMapping::Currency(currency),
        _ => SymbolMapping::Unrecognized,
    }
}

/// Trade channel name for an arbitrary wire symbol.
#[must_use]
pub fn trade_channel(wire_symbol: &str) -> String {
    format!("{}{TRADE_CHANNEL_SUFFIX}", wire_symbol.to_lowercase())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;

    #[test_case("BTCUSDT", SymbolMapping::Currency(CurrencyCode::Btc) ; "bitcoin")]
    #[test_case("ETHUSDT", SymbolMapping::Currency(CurrencyCode::Eth) ; "ethereum")]
    #[test_case("USDTUSDT", SymbolMapping::Ignored ; "quote against itself")]
    #[test_case("SOLUSDT", SymbolMapping::Unrecognized ; "untracked base")]
    #[test_case("BTCEUR", SymbolMapping::Unrecognized ; "other quote")]
    #[test_case("USDT", SymbolMapping::Unrecognized ; "empty base")]
    #[test_case("btcusdt", SymbolMapping::Unrecognized ; "lowercase wire symbol")]
    fn maps_wire_symbols(symbol: &str, expected: SymbolMapping) {
        assert_eq!(map_symbol(symbol), expected);
    }

    #[test]
    fn only_trailing_suffix_is_stripped() {
        assert_eq!(base_code("USDTBTCUSDT"), Some("USDTBTC"));
        assert_eq!(base_code("USDTUSDT"), Some("USDT"));
    }

    #[test]
    fn wire_symbols_and_channels() {
        assert_eq!(CurrencyCode::Btc.wire_symbol(), "BTCUSDT");
        assert_eq!(CurrencyCode::Eth.trade_channel(), "ethusdt@trade");
        assert_eq!(trade_channel("ETHUSDT"), "ethusdt@trade");
    }

    #[test]
    fn every_tracked_base_round_trips() {
        for currency in CurrencyCode::all() {
            let expected = if currency.is_quote() {
                SymbolMapping::Ignored
            } else {
                SymbolMapping::Currency(*currency)
            };
            assert_eq!(map_symbol(&currency.wire_symbol()), expected);
        }
    }

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!("btc".parse::<CurrencyCode>(), Ok(CurrencyCode::Btc));
        assert_eq!(" Eth ".parse::<CurrencyCode>(), Ok(CurrencyCode::Eth));
        assert!("DOGE".parse::<CurrencyCode>().is_err());
    }

    #[test]
    fn serializes_as_uppercase_code() {
        let json = serde_json::to_string(&CurrencyCode::Usdt).unwrap();
        assert_eq!(json, r#""USDT""#);
        let parsed: CurrencyCode = serde_json::from_str(r#""ETH""#).unwrap();
        assert_eq!(parsed, CurrencyCode::Eth);
    }

    proptest! {
        #[test]
        fn strips_quote_suffix_for_any_base(base in "[A-Z]{1,8}") {
            prop_assume!(base != QUOTE_CURRENCY);
            let symbol = format!("{base}{QUOTE_CURRENCY}");
            prop_assert_eq!(base_code(&symbol), Some(base.as_str()));
            prop_assert_ne!(map_symbol(&symbol), SymbolMapping::Ignored);
        }
    }
}
