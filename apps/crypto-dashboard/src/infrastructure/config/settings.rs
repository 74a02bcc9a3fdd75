//! Dashboard Configuration Settings
//!
//! Configuration types for the dashboard, loaded from environment variables.

use std::time::Duration;

use crate::domain::currency::CurrencyCode;

/// Default Binance spot stream endpoint.
pub const DEFAULT_BINANCE_STREAM_URL: &str = "wss://stream.binance.com:9443/ws";

/// Default CoinGecko API base URL.
pub const DEFAULT_COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Default Airtable API base URL.
pub const DEFAULT_AIRTABLE_API_URL: &str = "https://api.airtable.com/v0";

/// Default Airtable table holding portfolio rows.
pub const DEFAULT_AIRTABLE_TABLE: &str = "Crypto Holdings";

/// Trade stream connection settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// WebSocket endpoint.
    pub url: String,
    /// Currencies to subscribe to.
    pub currencies: Vec<CurrencyCode>,
    /// Deadline for the handshake plus subscribe request.
    pub connect_timeout: Duration,
    /// Maximum silence on an open connection before it is considered dead.
    pub idle_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_BINANCE_STREAM_URL.to_string(),
            currencies: vec![CurrencyCode::Btc, CurrencyCode::Eth],
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(60),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 5,
        }
    }
}

/// Price history and spot quote source settings.
#[derive(Debug, Clone)]
pub struct MarketDataSettings {
    /// CoinGecko API base URL.
    pub coingecko_url: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for MarketDataSettings {
    fn default() -> Self {
        Self {
            coingecko_url: DEFAULT_COINGECKO_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Airtable credentials.
///
/// Both values are optional at startup; the holdings panel reports the
/// missing one when asked.
#[derive(Clone, Default)]
pub struct AirtableCredentials {
    token: Option<String>,
    base_id: Option<String>,
}

impl AirtableCredentials {
    /// Create credentials. Empty strings count as missing.
    #[must_use]
    pub fn new(token: Option<String>, base_id: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            base_id: base_id.filter(|b| !b.trim().is_empty()),
        }
    }

    /// Personal access token.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Base identifier.
    #[must_use]
    pub fn base_id(&self) -> Option<&str> {
        self.base_id.as_deref()
    }
}

impl std::fmt::Debug for AirtableCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| if v.is_some() { "[REDACTED]" } else { "<unset>" };
        f.debug_struct("AirtableCredentials")
            .field("token", &redact(&self.token))
            .field("base_id", &redact(&self.base_id))
            .finish()
    }
}

/// Holdings store settings.
#[derive(Debug, Clone)]
pub struct HoldingsSettings {
    /// Airtable API base URL.
    pub api_url: String,
    /// Table holding `Currency` / `Amount` rows.
    pub table: String,
    /// Credentials.
    pub credentials: AirtableCredentials,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for HoldingsSettings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_AIRTABLE_API_URL.to_string(),
            table: DEFAULT_AIRTABLE_TABLE.to_string(),
            credentials: AirtableCredentials::default(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Dashboard HTTP port.
    pub http_port: u16,
    /// Whether `/metrics` is served.
    pub metrics_enabled: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_port: 8080,
            metrics_enabled: true,
        }
    }
}

/// Complete dashboard configuration.
#[derive(Debug, Clone, Default)]
pub struct DashboardConfig {
    /// Trade stream settings.
    pub stream: StreamSettings,
    /// Price history settings.
    pub market_data: MarketDataSettings,
    /// Holdings store settings.
    pub holdings: HoldingsSettings,
    /// HTTP server settings.
    pub server: ServerSettings,
}

impl DashboardConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `DASHBOARD_SYMBOLS` names an unknown currency or
    /// selects nothing to stream.
    pub fn from_env() -> Result<Self, ConfigError> {
        let stream_defaults = StreamSettings::default();
        let currencies = match std::env::var("DASHBOARD_SYMBOLS") {
            Ok(raw) => parse_currencies(&raw)?,
            Err(_) => stream_defaults.currencies.clone(),
        };

        let stream = StreamSettings {
            url: parse_env_string("BINANCE_STREAM_URL", &stream_defaults.url),
            currencies,
            connect_timeout: parse_env_duration_secs(
                "DASHBOARD_CONNECT_TIMEOUT_SECS",
                stream_defaults.connect_timeout,
            ),
            idle_timeout: parse_env_duration_secs(
                "DASHBOARD_IDLE_TIMEOUT_SECS",
                stream_defaults.idle_timeout,
            ),
            reconnect_delay_initial: parse_env_duration_millis(
                "DASHBOARD_RECONNECT_DELAY_INITIAL_MS",
                stream_defaults.reconnect_delay_initial,
            ),
            reconnect_delay_max: parse_env_duration_secs(
                "DASHBOARD_RECONNECT_DELAY_MAX_SECS",
                stream_defaults.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: parse_env_f64(
                "DASHBOARD_RECONNECT_DELAY_MULTIPLIER",
                stream_defaults.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: parse_env_u32(
                "DASHBOARD_MAX_RECONNECT_ATTEMPTS",
                stream_defaults.max_reconnect_attempts,
            ),
        };

        let request_timeout = parse_env_duration_secs(
            "DASHBOARD_HTTP_TIMEOUT_SECS",
            MarketDataSettings::default().request_timeout,
        );

        let market_data = MarketDataSettings {
            coingecko_url: parse_env_string("COINGECKO_API_URL", DEFAULT_COINGECKO_API_URL),
            request_timeout,
        };

        let holdings = HoldingsSettings {
            api_url: parse_env_string("AIRTABLE_API_URL", DEFAULT_AIRTABLE_API_URL),
            table: parse_env_string("AIRTABLE_TABLE_NAME", DEFAULT_AIRTABLE_TABLE),
            credentials: AirtableCredentials::new(
                std::env::var("AIRTABLE_TOKEN").ok(),
                std::env::var("AIRTABLE_BASE_ID").ok(),
            ),
            request_timeout,
        };

        let server = ServerSettings {
            http_port: parse_env_u16("DASHBOARD_HTTP_PORT", ServerSettings::default().http_port),
            metrics_enabled: parse_env_bool(
                "DASHBOARD_METRICS_ENABLED",
                ServerSettings::default().metrics_enabled,
            ),
        };

        Ok(Self {
            stream,
            market_data,
            holdings,
            server,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A listed currency is not tracked by the dashboard.
    #[error("DASHBOARD_SYMBOLS contains unknown currency: {0}")]
    UnknownCurrency(String),
    /// The currency list selects nothing to stream.
    #[error("DASHBOARD_SYMBOLS must name at least one streamable currency")]
    NoStreamableCurrency,
}

/// Parse a comma-separated currency list, dropping the quote currency.
fn parse_currencies(raw: &str) -> Result<Vec<CurrencyCode>, ConfigError> {
    let mut currencies = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let currency: CurrencyCode = part
            .parse()
            .map_err(|_| ConfigError::UnknownCurrency(part.to_string()))?;
        if !currency.is_quote() && !currencies.contains(&currency) {
            currencies.push(currency);
        }
    }
    if currencies.is_empty() {
        return Err(ConfigError::NoStreamableCurrency);
    }
    Ok(currencies)
}

fn parse_env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn parse_env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn parse_env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 1.0)
        .unwrap_or(default)
}

fn parse_env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}
