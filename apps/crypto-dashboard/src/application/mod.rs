//! Application Layer - Use cases and port definitions.
//!
//! Ports describe the external data sources; services wire them to the
//! domain types.

/// Port interfaces for the trade feed, price history and holdings store.
pub mod ports;

/// Price subscription facade and dashboard state.
pub mod services;
