//! Domain Layer - Currency, price and portfolio types.
//!
//! Pure types and functions with no I/O. Everything here is usable from
//! synchronous code and safe to share across tasks.

/// Currency codes and wire-symbol mapping.
pub mod currency;

/// Current/previous price reconciliation.
pub mod prices;

/// Portfolio valuation and aggregation math.
pub mod portfolio;

/// Trade stream events, connection states and error kinds.
pub mod streaming;
