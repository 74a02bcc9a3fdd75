//! CoinGecko Market Data Adapter
//!
//! Implements [`HistoricalPricePort`] and [`SpotPricePort`] over the public
//! CoinGecko REST API.
//!
//! # Endpoints
//!
//! - `GET /coins/{id}/market_chart?vs_currency=usd&days=30&interval=daily`
//!   returns `{"prices": [[epoch_ms, price], ...]}`
//! - `GET /simple/price?ids=bitcoin,ethereum,tether&vs_currencies=usd`
//!   returns `{"bitcoin": {"usd": 65000.1}, ...}`
//!
//! Both degrade on failure: the error is logged and counted, and callers get
//! an empty series or an all-zero table.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use chrono::DateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Number, Value};

use crate::application::ports::{HistoricalPricePort, PricePoint, SpotPricePort};
use crate::domain::currency::CurrencyCode;
use crate::domain::prices::PriceTable;
use crate::infrastructure::config::MarketDataSettings;
use crate::infrastructure::metrics::{self, FetchSource};

/// Days of history requested for charts.
pub const HISTORY_DAYS: u32 = 30;

/// Errors from HTTP fetchers.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Client could not be built or the request failed in transit.
    #[error("network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// Response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// CoinGecko coin identifier for a currency.
#[must_use]
pub const fn coin_id(currency: CurrencyCode) -> &'static str {
    match currency {
        CurrencyCode::Btc => "bitcoin",
        CurrencyCode::Eth => "ethereum",
        CurrencyCode::Usdt => "tether",
    }
}

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    #[serde(default)]
    prices: Vec<Vec<Value>>,
}

/// CoinGecko REST client.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: reqwest::Client,
    base_url: String,
}

impl CoinGeckoClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &MarketDataSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.coingecko_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the daily price series for a currency.
    ///
    /// Points with an unrepresentable timestamp or price are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn fetch_history(
        &self,
        currency: CurrencyCode,
    ) -> Result<Vec<PricePoint>, FetchError> {
        let url = format!("{}/coins/{}/market_chart", self.base_url, coin_id(currency));
        let days = HISTORY_DAYS.to_string();
        let response: MarketChartResponse = self
            .get_json(
                &url,
                &[
                    ("vs_currency", "usd"),
                    ("days", days.as_str()),
                    ("interval", "daily"),
                ],
            )
            .await?;

        let total = response.prices.len();
        let points: Vec<PricePoint> = response
            .prices
            .iter()
            .map(Vec::as_slice)
            .filter_map(price_point)
            .collect();
        if points.len() < total {
            tracing::debug!(
                currency = %currency,
                dropped = total - points.len(),
                "Dropped history points with invalid dates or prices"
            );
        }
        Ok(points)
    }

    /// Fetch USD spot prices for every tracked currency.
    ///
    /// Currencies missing from the response are zero.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status, or an
    /// undecodable body.
    pub async fn fetch_spot(&self) -> Result<PriceTable, FetchError> {
        let url = format!("{}/simple/price", self.base_url);
        let ids = CurrencyCode::all()
            .iter()
            .map(|&c| coin_id(c))
            .collect::<Vec<_>>()
            .join(",");
        let response: HashMap<String, HashMap<String, Value>> = self
            .get_json(&url, &[("ids", ids.as_str()), ("vs_currencies", "usd")])
            .await?;

        Ok(CurrencyCode::all()
            .iter()
            .filter_map(|&currency| {
                let quote = response.get(coin_id(currency))?.get("usd")?;
                let price = number(quote).and_then(decimal_from_number)?;
                Some((currency, price))
            })
            .collect())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl HistoricalPricePort for CoinGeckoClient {
    async fn historical_prices(&self, currency: CurrencyCode) -> Vec<PricePoint> {
        let started = Instant::now();
        let result = self.fetch_history(currency).await;
        metrics::record_fetch_duration(FetchSource::History, started.elapsed());

        result.unwrap_or_else(|e| {
            tracing::warn!(currency = %currency, error = %e, "Failed to fetch price history");
            metrics::record_fetch_failure(FetchSource::History);
            Vec::new()
        })
    }
}

#[async_trait]
impl SpotPricePort for CoinGeckoClient {
    async fn spot_prices(&self) -> PriceTable {
        let started = Instant::now();
        let result = self.fetch_spot().await;
        metrics::record_fetch_duration(FetchSource::Spot, started.elapsed());

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to fetch spot prices");
            metrics::record_fetch_failure(FetchSource::Spot);
            PriceTable::zeroed()
        })
    }
}

/// Convert a `[epoch_ms, price]` pair.
#[allow(clippy::cast_possible_truncation)]
fn price_point(pair: &[Value]) -> Option<PricePoint> {
    let [timestamp, price] = pair else {
        return None;
    };
    let millis = timestamp
        .as_i64()
        .or_else(|| timestamp.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))?;
    Some(PricePoint {
        date: DateTime::from_timestamp_millis(millis)?,
        price: decimal_from_number(number(price)?)?,
    })
}

const fn number(value: &Value) -> Option<&Number> {
    match value {
        Value::Number(n) => Some(n),
        _ => None,
    }
}

/// Parse a JSON number through its text form, keeping the printed digits.
fn decimal_from_number(number: &Number) -> Option<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    #[test]
    fn coin_ids() {
        assert_eq!(coin_id(CurrencyCode::Btc), "bitcoin");
        assert_eq!(coin_id(CurrencyCode::Eth), "ethereum");
        assert_eq!(coin_id(CurrencyCode::Usdt), "tether");
    }

    #[test]
    fn price_point_from_pair() {
        let point = price_point(&[json!(1_700_000_000_000_i64), json!(37123.45)]).unwrap();
        assert_eq!(point.date.timestamp(), 1_700_000_000);
        assert_eq!(point.price, dec!(37123.45));
    }

    #[test]
    fn invalid_points_are_dropped() {
        assert!(price_point(&[json!(i64::MAX), json!(1.0)]).is_none());
        assert!(price_point(&[json!("yesterday"), json!(1.0)]).is_none());
        assert!(price_point(&[json!(0), json!("abc")]).is_none());
        assert!(price_point(&[json!(0)]).is_none());
    }

    #[test]
    fn scientific_numbers_parse() {
        let n: Number = serde_json::from_str("1.5e-5").unwrap();
        assert_eq!(decimal_from_number(&n), Some(dec!(0.000015)));
    }
}
