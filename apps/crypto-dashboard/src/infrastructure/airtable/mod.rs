//! Airtable Holdings Adapter
//!
//! Reads stored portfolio rows (`Currency`, `Amount`) from an Airtable
//! table through the REST list-records endpoint:
//!
//! ```text
//! GET {api}/{base_id}/{table}?offset=...
//! Authorization: Bearer {token}
//!
//! {"records": [{"id": "rec1", "fields": {"Currency": "BTC", "Amount": 0.5}}],
//!  "offset": "itr..."}
//! ```
//!
//! Pages are followed until the response carries no `offset`.

use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::application::ports::{HoldingsError, HoldingsPort, PortfolioHolding};
use crate::infrastructure::config::{AirtableCredentials, HoldingsSettings};
use crate::infrastructure::metrics::{self, FetchSource};

/// Upper bound on pages followed in one listing.
const MAX_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
struct ListRecordsResponse {
    #[serde(default)]
    records: Vec<Record>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(default)]
    fields: RecordFields,
}

#[derive(Debug, Default, Deserialize)]
struct RecordFields {
    #[serde(rename = "Currency", default)]
    currency: Option<String>,
    #[serde(rename = "Amount", default)]
    amount: Option<Value>,
}

impl RecordFields {
    fn into_holding(self) -> Option<PortfolioHolding> {
        let currency = self.currency?.trim().to_string();
        if currency.is_empty() {
            return None;
        }
        let amount = self.amount.as_ref().and_then(parse_amount);
        Some(PortfolioHolding { currency, amount })
    }
}

/// Amounts may be stored as numbers or as numeric text.
fn parse_amount(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Holdings store backed by an Airtable table.
#[derive(Debug, Clone)]
pub struct AirtableClient {
    client: reqwest::Client,
    api_url: String,
    table: String,
    credentials: AirtableCredentials,
}

impl AirtableClient {
    /// Create a client. Credentials are checked per request, not here.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &HoldingsSettings) -> Result<Self, HoldingsError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|e| HoldingsError::Fetch(e.to_string()))?;

        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            table: settings.table.clone(),
            credentials: settings.credentials.clone(),
        })
    }

    fn records_url(&self, base_id: &str) -> Result<Url, HoldingsError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| HoldingsError::Fetch(format!("invalid AIRTABLE_API_URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| HoldingsError::Fetch("AIRTABLE_API_URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(base_id)
            .push(&self.table);
        Ok(url)
    }

    async fn fetch_page(
        &self,
        url: &Url,
        token: &str,
        offset: Option<&str>,
    ) -> Result<ListRecordsResponse, HoldingsError> {
        let mut request = self.client.get(url.clone()).bearer_auth(token);
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| HoldingsError::Fetch(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json()
                .await
                .map_err(|e| HoldingsError::Fetch(format!("failed to decode records: {e}"))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(HoldingsError::Unauthorized),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(HoldingsError::Fetch(format!("HTTP {}: {body}", status.as_u16())))
            }
        }
    }

    async fn fetch_all(&self) -> Result<Vec<PortfolioHolding>, HoldingsError> {
        let token = self
            .credentials
            .token()
            .ok_or(HoldingsError::Configuration("AIRTABLE_TOKEN"))?;
        let base_id = self
            .credentials
            .base_id()
            .ok_or(HoldingsError::Configuration("AIRTABLE_BASE_ID"))?;
        let url = self.records_url(base_id)?;

        let mut holdings = Vec::new();
        let mut offset: Option<String> = None;
        for page in 1..=MAX_PAGES {
            let response = self.fetch_page(&url, token, offset.as_deref()).await?;
            holdings.extend(
                response
                    .records
                    .into_iter()
                    .filter_map(|record| record.fields.into_holding()),
            );
            match response.offset {
                Some(next) => offset = Some(next),
                None => {
                    tracing::debug!(pages = page, rows = holdings.len(), "Fetched holdings");
                    return Ok(holdings);
                }
            }
        }

        tracing::warn!(pages = MAX_PAGES, "Holdings listing truncated");
        Ok(holdings)
    }
}

#[async_trait]
impl HoldingsPort for AirtableClient {
    async fn portfolio_holdings(&self) -> Result<Vec<PortfolioHolding>, HoldingsError> {
        let started = Instant::now();
        let result = self.fetch_all().await;
        metrics::record_fetch_duration(FetchSource::Holdings, started.elapsed());

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Failed to fetch portfolio holdings");
            metrics::record_fetch_failure(FetchSource::Holdings);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn client(token: Option<&str>, base: Option<&str>) -> AirtableClient {
        let settings = HoldingsSettings {
            credentials: AirtableCredentials::new(
                token.map(str::to_string),
                base.map(str::to_string),
            ),
            ..HoldingsSettings::default()
        };
        AirtableClient::new(&settings).unwrap()
    }

    #[test]
    fn amounts_accept_numbers_and_text() {
        assert_eq!(parse_amount(&json!(0.5)), Some(dec!(0.5)));
        assert_eq!(parse_amount(&json!(" 2.25 ")), Some(dec!(2.25)));
        assert_eq!(parse_amount(&json!("lots")), None);
        assert_eq!(parse_amount(&json!(null)), None);
    }

    #[test]
    fn rows_without_currency_are_skipped() {
        let fields: RecordFields = serde_json::from_value(json!({"Amount": 1})).unwrap();
        assert!(fields.into_holding().is_none());

        let fields: RecordFields =
            serde_json::from_value(json!({"Currency": "ETH", "Amount": "x"})).unwrap();
        assert_eq!(
            fields.into_holding(),
            Some(PortfolioHolding {
                currency: "ETH".to_string(),
                amount: None
            })
        );
    }

    #[test]
    fn table_name_is_path_encoded() {
        let url = client(Some("t"), Some("app1")).records_url("app1").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.airtable.com/v0/app1/Crypto%20Holdings"
        );
    }

    #[tokio::test]
    async fn missing_token_is_a_configuration_error() {
        let err = client(None, Some("app1"))
            .portfolio_holdings()
            .await
            .unwrap_err();
        assert_eq!(err, HoldingsError::Configuration("AIRTABLE_TOKEN"));
    }

    #[tokio::test]
    async fn missing_base_is_a_configuration_error() {
        let err = client(Some("pat"), None)
            .portfolio_holdings()
            .await
            .unwrap_err();
        assert_eq!(err, HoldingsError::Configuration("AIRTABLE_BASE_ID"));
    }
}
