//! Dashboard HTTP API Tests
//!
//! Drives the router in-process with scripted price feeds and in-memory
//! data sources.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::DateTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crypto_dashboard::application::ports::{
    HistoricalPricePort, HoldingsError, HoldingsPort, PortfolioHolding, PricePoint,
};
use crypto_dashboard::{
    ConnectionState, CurrencyCode, Dashboard, PriceSubscriptionService, StreamEvent, TradeEvent,
    TradeFeed, router,
};

// =============================================================================
// Fakes
// =============================================================================

/// Replays a fixed script of events, then idles until cancelled.
struct ScriptedFeed {
    events: Vec<StreamEvent>,
}

#[async_trait]
impl TradeFeed for ScriptedFeed {
    async fn stream(
        &self,
        _wire_symbols: Vec<String>,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) {
        for event in self.events.clone() {
            if events.send(event).await.is_err() {
                return;
            }
        }
        cancel.cancelled().await;
    }
}

struct FixedHistory;

#[async_trait]
impl HistoricalPricePort for FixedHistory {
    async fn historical_prices(&self, currency: CurrencyCode) -> Vec<PricePoint> {
        if currency != CurrencyCode::Btc {
            return Vec::new();
        }
        vec![
            PricePoint {
                date: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                price: dec!(65000),
            },
            PricePoint {
                date: DateTime::from_timestamp(1_700_086_400, 0).unwrap(),
                price: dec!(999.5),
            },
        ]
    }
}

struct FixedHoldings(Result<Vec<PortfolioHolding>, HoldingsError>);

#[async_trait]
impl HoldingsPort for FixedHoldings {
    async fn portfolio_holdings(&self) -> Result<Vec<PortfolioHolding>, HoldingsError> {
        self.0.clone()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn live_feed() -> Vec<StreamEvent> {
    vec![
        StreamEvent::State(ConnectionState::Open),
        StreamEvent::Trade(TradeEvent::new("BTCUSDT", dec!(50000))),
        StreamEvent::Trade(TradeEvent::new("ETHUSDT", dec!(3000))),
    ]
}

async fn dashboard_with(
    events: Vec<StreamEvent>,
    holdings: Result<Vec<PortfolioHolding>, HoldingsError>,
) -> Arc<Dashboard> {
    let expected_trades = events
        .iter()
        .filter(|e| matches!(e, StreamEvent::Trade(_)))
        .count();

    let service = PriceSubscriptionService::new(Arc::new(ScriptedFeed { events }));
    let subscription = service
        .subscribe(&[CurrencyCode::Btc, CurrencyCode::Eth], |_, _| {}, || {}, |_| {})
        .unwrap();

    let dashboard = Arc::new(Dashboard::new(
        subscription,
        Arc::new(FixedHistory),
        Arc::new(FixedHoldings(holdings)),
    ));

    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let board = dashboard.prices();
            let updated = board
                .quotes
                .iter()
                .filter(|q| !q.currency.is_quote() && !q.price.is_zero())
                .count();
            if updated >= expected_trades.min(2) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    dashboard
}

async fn live_dashboard() -> Arc<Dashboard> {
    dashboard_with(live_feed(), Ok(Vec::new())).await
}

async fn call(dashboard: &Arc<Dashboard>, request: Request<Body>) -> (StatusCode, Value) {
    let response = router(Arc::clone(dashboard), false)
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    (status, body)
}

async fn get(dashboard: &Arc<Dashboard>, uri: &str) -> (StatusCode, Value) {
    call(
        dashboard,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

fn decimal(value: &Value) -> Decimal {
    Decimal::from_str(value.as_str().unwrap()).unwrap()
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn liveness_is_always_ok() {
    let dashboard = dashboard_with(Vec::new(), Ok(Vec::new())).await;
    let (status, body) = get(&dashboard, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!("OK"));
}

#[tokio::test]
async fn readiness_follows_connection_state() {
    let dashboard = dashboard_with(Vec::new(), Ok(Vec::new())).await;
    let (status, _) = get(&dashboard, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let dashboard = live_dashboard().await;
    let (status, _) = get(&dashboard, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn prices_report_connection_and_trend() {
    let dashboard = live_dashboard().await;
    let (status, body) = get(&dashboard, "/api/prices").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connection"], json!({"state": "open"}));

    let quotes = body["quotes"].as_array().unwrap();
    assert_eq!(quotes.len(), 3);
    assert_eq!(quotes[0]["currency"], "BTC");
    assert_eq!(decimal(&quotes[0]["price"]), dec!(50000));
    assert_eq!(decimal(&quotes[0]["previous"]), Decimal::ZERO);
    assert_eq!(quotes[0]["trend"], "up");
    assert_eq!(quotes[2]["currency"], "USDT");
    assert_eq!(decimal(&quotes[2]["price"]), Decimal::ONE);
    assert_eq!(quotes[2]["trend"], "unchanged");
}

#[tokio::test]
async fn amounts_accept_text_and_numbers() {
    let dashboard = live_dashboard().await;
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/amounts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"BTC":"0.5","ETH":"abc","USDT":100}"#))
        .unwrap();

    let (status, body) = call(&dashboard, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["BTC"]), dec!(0.5));
    assert_eq!(decimal(&body["ETH"]), Decimal::ZERO);
    assert_eq!(decimal(&body["USDT"]), dec!(100));

    let (_, stored) = get(&dashboard, "/api/amounts").await;
    assert_eq!(stored, body);

    let (status, portfolio) = get(&dashboard, "/api/portfolio").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&portfolio["total_value"]), dec!(25100));

    let allocation = portfolio["allocation"].as_array().unwrap();
    assert_eq!(allocation[0]["currency"], "BTC");
    assert_eq!(decimal(&allocation[0]["value"]), dec!(25000));
    assert_eq!(decimal(&allocation[1]["value"]), Decimal::ZERO);
    assert_eq!(decimal(&allocation[2]["value"]), dec!(100));
}

#[tokio::test]
async fn empty_portfolio_has_zero_percentages() {
    let dashboard = live_dashboard().await;
    let (status, body) = get(&dashboard, "/api/portfolio").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["total_value"]), Decimal::ZERO);
    for entry in body["allocation"].as_array().unwrap() {
        assert_eq!(decimal(&entry["percentage"]), Decimal::ZERO);
    }
}

#[tokio::test]
async fn oversized_amounts_keep_endpoints_serving() {
    let dashboard = live_dashboard().await;
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/amounts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"BTC":"79228162514264337593543950335"}"#))
        .unwrap();
    let (status, _) = call(&dashboard, request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, portfolio) = get(&dashboard, "/api/portfolio").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&portfolio["total_value"]), Decimal::MAX);
    assert_eq!(decimal(&portfolio["allocation"][0]["percentage"]), dec!(100));

    let (status, body) = get(
        &dashboard,
        "/api/convert?amount=79228162514264337593543950335&from=BTC&to=USDT",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["result"]), Decimal::MAX);

    let (status, _) = get(&dashboard, "/api/prices").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_currency_in_amounts_is_rejected() {
    let dashboard = live_dashboard().await;
    let request = Request::builder()
        .method(Method::PUT)
        .uri("/api/amounts")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"DOGE":"1"}"#))
        .unwrap();

    let (status, _) = call(&dashboard, request).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn history_labels_points() {
    let dashboard = live_dashboard().await;
    let (status, body) = get(&dashboard, "/api/history/btc").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["currency"], "BTC");
    let points = body["points"].as_array().unwrap();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0]["date"], "2023-11-14T22:13:20Z");
    assert_eq!(points[0]["label"], "$65.00k");
    assert_eq!(points[1]["label"], "$999.50");

    let (status, body) = get(&dashboard, "/api/history/ETH").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["points"], json!([]));
}

#[tokio::test]
async fn history_for_unknown_currency_is_not_found() {
    let dashboard = live_dashboard().await;
    let (status, body) = get(&dashboard, "/api/history/doge").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unsupported currency: DOGE");
}

#[tokio::test]
async fn holdings_are_listed() {
    let holdings = vec![
        PortfolioHolding {
            currency: "BTC".to_string(),
            amount: Some(dec!(0.25)),
        },
        PortfolioHolding {
            currency: "SOL".to_string(),
            amount: None,
        },
    ];
    let dashboard = dashboard_with(live_feed(), Ok(holdings)).await;
    let (status, body) = get(&dashboard, "/api/holdings").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"holdings": [
            {"currency": "BTC", "amount": "0.25"},
            {"currency": "SOL", "amount": null},
        ]})
    );
}

#[tokio::test]
async fn missing_holdings_credentials_explain_remediation() {
    let dashboard = dashboard_with(
        live_feed(),
        Err(HoldingsError::Configuration("AIRTABLE_TOKEN")),
    )
    .await;
    let (status, body) = get(&dashboard, "/api/holdings").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        body["error"],
        "AIRTABLE_TOKEN is not set in the environment variables"
    );
    assert!(
        body["remediation"]
            .as_str()
            .unwrap()
            .contains("AIRTABLE_TOKEN")
    );
}

#[tokio::test]
async fn rejected_holdings_credentials_are_bad_gateway() {
    let dashboard = dashboard_with(live_feed(), Err(HoldingsError::Unauthorized)).await;
    let (status, body) = get(&dashboard, "/api/holdings").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["remediation"].is_string());
}

#[tokio::test]
async fn convert_uses_live_prices() {
    let dashboard = live_dashboard().await;

    let (status, body) = get(&dashboard, "/api/convert?amount=2&from=BTC&to=ETH").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from"], "BTC");
    assert_eq!(body["to"], "ETH");
    assert_eq!(decimal(&body["result"]), dec!(100000) / dec!(3000));

    let (status, body) = get(&dashboard, "/api/convert?amount=oops&from=ETH&to=USDT").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decimal(&body["result"]), Decimal::ZERO);

    let (status, _) = get(&dashboard, "/api/convert?amount=1&from=BTC&to=DOGE").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_route_is_optional() {
    let dashboard = live_dashboard().await;
    let response = router(Arc::clone(&dashboard), false)
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
