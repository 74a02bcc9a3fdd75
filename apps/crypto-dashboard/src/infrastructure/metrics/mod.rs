//! Prometheus Metrics Module
//!
//! Exposes dashboard metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Stream**: trades received and ignored, parse errors, stream errors
//!   by kind, reconnects, connection state
//! - **Fetchers**: failures and latency of history, spot and holdings
//!   requests
//!
//! Recording functions are no-ops until [`init_metrics`] installs the
//! recorder, so tests can call them freely.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::streaming::{ConnectionState, StreamError};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, or return the existing handle.
///
/// # Errors
///
/// Returns an error if another global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "crypto_dashboard_trades_received_total",
        "Trade events decoded from the stream"
    );
    describe_counter!(
        "crypto_dashboard_trades_ignored_total",
        "Trade events whose symbol is not tracked"
    );
    describe_counter!(
        "crypto_dashboard_parse_errors_total",
        "Stream messages dropped because they could not be decoded"
    );
    describe_counter!(
        "crypto_dashboard_stream_errors_total",
        "Stream errors by kind"
    );
    describe_counter!(
        "crypto_dashboard_reconnects_total",
        "Stream reconnection attempts"
    );
    describe_gauge!(
        "crypto_dashboard_connection_state",
        "Stream connection state (0 connecting, 1 open, 2 reconnecting, 3 closed, 4 failed)"
    );
    describe_counter!(
        "crypto_dashboard_fetch_failures_total",
        "Failed history, spot or holdings requests by source"
    );
    describe_histogram!(
        "crypto_dashboard_fetch_duration_seconds",
        "Latency of history, spot and holdings requests by source"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// External data source label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    /// Daily price history.
    History,
    /// Spot quotes.
    Spot,
    /// Stored holdings.
    Holdings,
}

impl FetchSource {
    /// Label value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::History => "history",
            Self::Spot => "spot",
            Self::Holdings => "holdings",
        }
    }
}

const fn state_value(state: &ConnectionState) -> f64 {
    match state {
        ConnectionState::Connecting => 0.0,
        ConnectionState::Open => 1.0,
        ConnectionState::Reconnecting { .. } => 2.0,
        ConnectionState::Closed => 3.0,
        ConnectionState::Failed { .. } => 4.0,
    }
}

/// Record a decoded trade event.
pub fn record_trade_received() {
    counter!("crypto_dashboard_trades_received_total").increment(1);
}

/// Record a trade for a symbol the dashboard does not track.
pub fn record_trade_ignored() {
    counter!("crypto_dashboard_trades_ignored_total").increment(1);
}

/// Record a stream error.
pub fn record_stream_error(error: &StreamError) {
    if matches!(error, StreamError::Parse { .. }) {
        counter!("crypto_dashboard_parse_errors_total").increment(1);
    }
    counter!(
        "crypto_dashboard_stream_errors_total",
        "kind" => error.kind()
    )
    .increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("crypto_dashboard_reconnects_total").increment(1);
}

/// Update the connection state gauge.
pub fn set_connection_state(state: &ConnectionState) {
    gauge!("crypto_dashboard_connection_state").set(state_value(state));
}

/// Record a failed fetch.
pub fn record_fetch_failure(source: FetchSource) {
    counter!(
        "crypto_dashboard_fetch_failures_total",
        "source" => source.as_str()
    )
    .increment(1);
}

/// Record fetch latency.
pub fn record_fetch_duration(source: FetchSource, duration: Duration) {
    histogram!(
        "crypto_dashboard_fetch_duration_seconds",
        "source" => source.as_str()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
