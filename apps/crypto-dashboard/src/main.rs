//! Crypto Dashboard Binary
//!
//! Streams live prices and serves the dashboard API.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin crypto-dashboard
//! ```
//!
//! # Environment Variables
//!
//! ## Optional
//! - `BINANCE_STREAM_URL`: trade stream endpoint (default: wss://stream.binance.com:9443/ws)
//! - `DASHBOARD_SYMBOLS`: streamed currencies (default: BTC,ETH)
//! - `DASHBOARD_HTTP_PORT`: HTTP port (default: 8080)
//! - `DASHBOARD_METRICS_ENABLED`: serve `/metrics` (default: true)
//! - `COINGECKO_API_URL`: price history API (default: <https://api.coingecko.com/api/v3>)
//! - `AIRTABLE_TOKEN`, `AIRTABLE_BASE_ID`: holdings store credentials
//! - `OTEL_ENABLED`: export spans over OTLP (default: false)
//! - `RUST_LOG`: log filter (default: crypto_dashboard=info)

use std::sync::Arc;
use std::time::Duration;

use crypto_dashboard::application::ports::SpotPricePort;
use crypto_dashboard::infrastructure::telemetry;
use crypto_dashboard::{
    AirtableClient, BinanceClientConfig, BinanceTradeClient, CoinGeckoClient, Dashboard,
    DashboardConfig, DashboardServer, PriceSubscriptionService, PriceTable, init_metrics,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Time allowed for the HTTP server to drain after shutdown starts.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting crypto dashboard");

    let config = DashboardConfig::from_env()?;
    log_config(&config);

    if config.server.metrics_enabled {
        init_metrics()?;
    }

    let market_data = Arc::new(CoinGeckoClient::new(&config.market_data)?);
    let holdings = Arc::new(AirtableClient::new(&config.holdings)?);
    let feed = Arc::new(BinanceTradeClient::new(
        BinanceClientConfig::from_stream_settings(&config.stream),
    ));

    let initial_prices = PriceTable::seeded_from_spot(&market_data.spot_prices().await);
    tracing::info!(prices = ?initial_prices, "Seeded initial prices");

    let subscription = PriceSubscriptionService::new(feed)
        .with_initial_prices(initial_prices)
        .subscribe(
            &config.stream.currencies,
            |currency, price| tracing::trace!(%currency, %price, "Price update"),
            || tracing::info!("Price stream connected"),
            |error| tracing::warn!(kind = error.kind(), %error, "Price stream error"),
        )?;

    let dashboard = Arc::new(Dashboard::new(subscription, market_data, holdings));

    let shutdown_token = CancellationToken::new();
    let server = DashboardServer::new(
        config.server.http_port,
        config.server.metrics_enabled,
        Arc::clone(&dashboard),
        shutdown_token.clone(),
    );
    let mut server_task = tokio::spawn(server.run());

    tracing::info!("Crypto dashboard ready");

    tokio::select! {
        () = await_shutdown() => {}
        result = &mut server_task => {
            dashboard.shutdown();
            result??;
            return Ok(());
        }
    }

    shutdown_token.cancel();
    dashboard.shutdown();

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server_task).await {
        Ok(result) => result??,
        Err(_) => tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "HTTP server did not stop in time"
        ),
    }

    tracing::info!("Crypto dashboard stopped");
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &DashboardConfig) {
    tracing::info!(
        stream_url = %config.stream.url,
        currencies = ?config.stream.currencies,
        http_port = config.server.http_port,
        metrics_enabled = config.server.metrics_enabled,
        max_reconnect_attempts = config.stream.max_reconnect_attempts,
        "Configuration loaded"
    );
    tracing::debug!(
        coingecko_url = %config.market_data.coingecko_url,
        airtable_url = %config.holdings.api_url,
        airtable_table = %config.holdings.table,
        credentials = ?config.holdings.credentials,
        "Data source endpoints"
    );
}

/// Load `.env` from the current directory or the nearest ancestor that has one.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Wait for Ctrl+C or SIGTERM.
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
