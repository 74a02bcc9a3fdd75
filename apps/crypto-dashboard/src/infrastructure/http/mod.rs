//! Dashboard HTTP Surface
//!
//! JSON endpoints backing the dashboard display, plus liveness and
//! Prometheus metrics.
//!
//! # Endpoints
//!
//! - `GET /healthz` - liveness (simple OK)
//! - `GET /readyz` - ready once the price stream is open
//! - `GET /api/prices` - connection state and live price board
//! - `GET /api/amounts`, `PUT /api/amounts` - user-entered amounts
//! - `GET /api/portfolio` - valuation and allocation
//! - `GET /api/history/{currency}` - 30-day daily series
//! - `GET /api/holdings` - stored holdings, or a local error with remediation
//! - `GET /api/convert?amount=&from=&to=` - conversion at live prices
//! - `GET /metrics` - Prometheus text format

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{HoldingsError, PortfolioHolding};
use crate::application::services::Dashboard;
use crate::domain::currency::CurrencyCode;
use crate::domain::portfolio::{self, Amounts};
use crate::domain::streaming::ConnectionState;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server failed while running.
    #[error("HTTP server failed: {0}")]
    ServerFailed(String),
}

/// Error body returned by API endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// What went wrong.
    pub error: String,
    /// What the operator can do about it, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

#[derive(Debug)]
enum ApiError {
    UnknownCurrency(String),
    Holdings(HoldingsError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::UnknownCurrency(code) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: format!("unsupported currency: {code}"),
                    remediation: None,
                },
            ),
            Self::Holdings(err) => {
                let status = match err {
                    HoldingsError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
                    HoldingsError::Unauthorized | HoldingsError::Fetch(_) => StatusCode::BAD_GATEWAY,
                };
                (
                    status,
                    ErrorBody {
                        error: err.to_string(),
                        remediation: Some(err.remediation().to_string()),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn parse_currency(code: &str) -> Result<CurrencyCode, ApiError> {
    code.parse()
        .map_err(|_| ApiError::UnknownCurrency(code.trim().to_uppercase()))
}

// =============================================================================
// Response Types
// =============================================================================

/// One point of a history chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPointView {
    /// Observation time.
    pub date: DateTime<Utc>,
    /// USD price.
    pub price: Decimal,
    /// Axis label, e.g. `$65.00k`.
    pub label: String,
}

/// History chart for one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryView {
    /// Currency.
    pub currency: CurrencyCode,
    /// Points in chronological order; empty when unavailable.
    pub points: Vec<HistoryPointView>,
}

/// Stored holdings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingsView {
    /// Rows from the holdings store.
    pub holdings: Vec<PortfolioHolding>,
}

/// Conversion request.
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertQuery {
    /// Amount as typed; malformed input counts as zero.
    #[serde(default)]
    pub amount: String,
    /// Source currency code.
    pub from: String,
    /// Target currency code.
    pub to: String,
}

/// Conversion result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionView {
    /// Parsed amount.
    pub amount: Decimal,
    /// Source currency.
    pub from: CurrencyCode,
    /// Target currency.
    pub to: CurrencyCode,
    /// Converted amount.
    pub result: Decimal,
}

// =============================================================================
// Router
// =============================================================================

/// Build the dashboard router.
pub fn router(dashboard: Arc<Dashboard>, metrics_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/api/prices", get(prices_handler))
        .route("/api/amounts", get(amounts_handler).put(update_amounts_handler))
        .route("/api/portfolio", get(portfolio_handler))
        .route("/api/history/{currency}", get(history_handler))
        .route("/api/holdings", get(holdings_handler))
        .route("/api/convert", get(convert_handler));

    if metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.with_state(dashboard)
}

// =============================================================================
// Server
// =============================================================================

/// Dashboard HTTP server.
pub struct DashboardServer {
    port: u16,
    metrics_enabled: bool,
    dashboard: Arc<Dashboard>,
    cancel: CancellationToken,
}

impl DashboardServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(
        port: u16,
        metrics_enabled: bool,
        dashboard: Arc<Dashboard>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            port,
            metrics_enabled,
            dashboard,
            cancel,
        }
    }

    /// Serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or the server stops with an
    /// error.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = router(self.dashboard, self.metrics_enabled);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Dashboard server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| ServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Dashboard server stopped");
        Ok(())
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(dashboard): State<Arc<Dashboard>>) -> impl IntoResponse {
    if dashboard.connection() == ConnectionState::Open {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn prices_handler(State(dashboard): State<Arc<Dashboard>>) -> impl IntoResponse {
    Json(dashboard.prices())
}

async fn amounts_handler(State(dashboard): State<Arc<Dashboard>>) -> Json<Amounts> {
    Json(dashboard.amounts())
}

/// Accepts `{"BTC": "0.5", "ETH": 2}`; values may be text or numbers.
async fn update_amounts_handler(
    State(dashboard): State<Arc<Dashboard>>,
    Json(input): Json<BTreeMap<CurrencyCode, Value>>,
) -> Json<Amounts> {
    let raw: BTreeMap<CurrencyCode, String> = input
        .into_iter()
        .map(|(currency, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                _ => String::new(),
            };
            (currency, text)
        })
        .collect();
    Json(dashboard.set_amounts(&raw))
}

async fn portfolio_handler(State(dashboard): State<Arc<Dashboard>>) -> impl IntoResponse {
    Json(dashboard.valuation())
}

async fn history_handler(
    State(dashboard): State<Arc<Dashboard>>,
    Path(code): Path<String>,
) -> Result<Json<HistoryView>, ApiError> {
    let currency = parse_currency(&code)?;
    let points = dashboard
        .history(currency)
        .await
        .into_iter()
        .map(|point| HistoryPointView {
            label: portfolio::format_axis_price(point.price),
            date: point.date,
            price: point.price,
        })
        .collect();
    Ok(Json(HistoryView { currency, points }))
}

async fn holdings_handler(
    State(dashboard): State<Arc<Dashboard>>,
) -> Result<Json<HoldingsView>, ApiError> {
    let holdings = dashboard.holdings().await.map_err(ApiError::Holdings)?;
    Ok(Json(HoldingsView { holdings }))
}

async fn convert_handler(
    State(dashboard): State<Arc<Dashboard>>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<ConversionView>, Response> {
    let bad_request = |e: ApiError| {
        let mut response = e.into_response();
        *response.status_mut() = StatusCode::BAD_REQUEST;
        response
    };
    let from = parse_currency(&query.from).map_err(bad_request)?;
    let to = parse_currency(&query.to).map_err(bad_request)?;
    let amount = portfolio::parse_amount(&query.amount);

    Ok(Json(ConversionView {
        amount,
        from,
        to,
        result: dashboard.convert(amount, from, to),
    }))
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4")],
                handle.render(),
            )
        },
    )
}
