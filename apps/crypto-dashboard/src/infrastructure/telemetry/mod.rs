//! Logging and Trace Export
//!
//! Installs the global `tracing` subscriber: an `EnvFilter` driven by
//! `RUST_LOG`, a fmt layer on stderr, and optionally an OpenTelemetry layer
//! exporting spans over OTLP/gRPC.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: filter directives (default: `crypto_dashboard=info,tower_http=info,hyper=warn,h2=warn`)
//! - `OTEL_ENABLED`: set to "true" to export spans (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: service name for spans (default: crypto-dashboard)

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_SERVICE_NAME: &str = "crypto-dashboard";

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

const DEFAULT_FILTER: &str = "crypto_dashboard=info,tower_http=info,hyper=warn,h2=warn";

/// Telemetry setup errors.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// `RUST_LOG` could not be parsed.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// The OTLP exporter could not be built.
    #[error("failed to build OTLP exporter: {0}")]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),

    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {0}")]
    Install(#[from] tracing_subscriber::util::TryInitError),
}

/// Shuts the tracer provider down when dropped, flushing pending spans.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("exporting", &self.tracer_provider.is_some())
            .finish()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Whether spans are exported.
    pub enabled: bool,
    /// OTLP exporter endpoint.
    pub otlp_endpoint: String,
    /// Service name attached to exported spans.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let enabled = std::env::var("OTEL_ENABLED")
            .is_ok_and(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1"));

        let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_OTLP_ENDPOINT.to_string());

        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| DEFAULT_SERVICE_NAME.to_string());

        Self {
            enabled,
            otlp_endpoint,
            service_name,
        }
    }
}

/// Initialize telemetry from the environment.
///
/// Keep the returned guard alive for the lifetime of the process.
///
/// # Errors
///
/// See [`init_with_config`].
pub fn init() -> Result<TelemetryGuard, TelemetryError> {
    init_with_config(TelemetryConfig::from_env())
}

/// Initialize telemetry with explicit configuration.
///
/// # Errors
///
/// Returns an error if `RUST_LOG` is malformed, the exporter cannot be
/// built, or a subscriber is already installed.
pub fn init_with_config(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives)?,
        _ => EnvFilter::try_new(DEFAULT_FILTER)?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if !config.enabled {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        return Ok(TelemetryGuard {
            tracer_provider: None,
        });
    }

    let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(otlp_exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .build();

    let tracer = tracer_provider.tracer(config.service_name);
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()?;

    Ok(TelemetryGuard {
        tracer_provider: Some(tracer_provider),
    })
}
