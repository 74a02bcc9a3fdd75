//! Application Services
//!
//! - `subscription`: subscribe/dispose facade over a trade feed
//! - `dashboard`: shared state read by the HTTP surface

pub mod dashboard;
pub mod subscription;

pub use dashboard::{Dashboard, PriceBoard, QuoteView};
pub use subscription::{PriceSubscriptionService, SubscribeError, SubscriptionHandle};
