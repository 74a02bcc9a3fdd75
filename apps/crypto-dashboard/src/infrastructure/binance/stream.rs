//! Binance Trade Stream Client
//!
//! Connects to the Binance spot WebSocket, subscribes to `<symbol>@trade`
//! channels and pushes decoded trades, state changes and errors to the
//! subscriber.
//!
//! # Stream URL
//!
//! - Production: `wss://stream.binance.com:9443/ws`
//!
//! # Lifecycle
//!
//! Server pings are answered by the WebSocket layer itself.
//!
//! Each connection attempt must complete the handshake and send the
//! subscribe request within `connect_timeout`. An open connection that
//! stays silent for `idle_timeout` is treated as lost. Lost connections are
//! retried with exponential backoff until attempts run out, at which point
//! the client reports `Failed` and stops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec::JsonCodec;
use super::messages::{StreamMessage, StreamRequest};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::TradeFeed;
use crate::domain::currency::{SymbolMapping, map_symbol};
use crate::domain::streaming::{ConnectionState, StreamError, StreamEvent};
use crate::infrastructure::config::StreamSettings;
use crate::infrastructure::metrics;

/// Time allowed for the close handshake on shutdown.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for [`BinanceTradeClient`].
#[derive(Debug, Clone)]
pub struct BinanceClientConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Deadline for handshake plus subscribe request.
    pub connect_timeout: Duration,
    /// Maximum silence on an open connection.
    pub idle_timeout: Duration,
    /// Reconnection behavior.
    pub reconnect: ReconnectConfig,
}

impl BinanceClientConfig {
    /// Build from stream settings.
    #[must_use]
    pub fn from_stream_settings(settings: &StreamSettings) -> Self {
        Self {
            url: settings.url.clone(),
            connect_timeout: settings.connect_timeout,
            idle_timeout: settings.idle_timeout,
            reconnect: ReconnectConfig::from_stream_settings(settings),
        }
    }
}

impl Default for BinanceClientConfig {
    fn default() -> Self {
        Self::from_stream_settings(&StreamSettings::default())
    }
}

// =============================================================================
// Trade Client
// =============================================================================

/// Trade feed backed by the Binance spot WebSocket.
///
/// One client can serve many subscriptions; each call to
/// [`TradeFeed::stream`] owns an independent connection.
#[derive(Debug)]
pub struct BinanceTradeClient {
    config: BinanceClientConfig,
    codec: JsonCodec,
    next_request_id: AtomicU64,
}

impl BinanceTradeClient {
    /// Create a new client.
    #[must_use]
    pub const fn new(config: BinanceClientConfig) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &BinanceClientConfig {
        &self.config
    }

    /// Run connection attempts until cancelled, the subscriber goes away, or
    /// reconnection gives up.
    async fn run(
        &self,
        wire_symbols: &[String],
        events: &mpsc::Sender<StreamEvent>,
        cancel: &CancellationToken,
    ) {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if cancel.is_cancelled() || events.is_closed() {
                break;
            }
            if !emit_state(events, ConnectionState::Connecting).await {
                return;
            }

            let err = match self
                .connect_and_run(wire_symbols, events, cancel, &mut policy)
                .await
            {
                Ok(()) => break,
                Err(err) => err,
            };
            if cancel.is_cancelled() {
                break;
            }

            tracing::warn!(error = %err, url = %self.config.url, "Trade stream connection lost");
            metrics::record_stream_error(&err);
            if !emit(events, StreamEvent::Error(err.clone())).await {
                return;
            }

            let Some(delay) = policy.next_delay() else {
                let attempts = policy.attempt_count();
                tracing::error!(attempts, error = %err, "Giving up on trade stream");
                let reason = format!("{err} (after {attempts} reconnection attempts)");
                let _ = emit_state(events, ConnectionState::Failed { reason }).await;
                return;
            };

            let attempt = policy.attempt_count();
            tracing::info!(
                attempt,
                delay_ms = delay.as_millis(),
                "Reconnecting to trade stream"
            );
            metrics::record_reconnect();
            if !emit_state(events, ConnectionState::Reconnecting { attempt }).await {
                return;
            }

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!("Trade stream closed");
        let _ = emit_state(events, ConnectionState::Closed).await;
    }

    /// Connect, subscribe, and read until the connection is lost.
    ///
    /// Returns `Ok(())` when stopped on purpose.
    async fn connect_and_run(
        &self,
        wire_symbols: &[String],
        events: &mpsc::Sender<StreamEvent>,
        cancel: &CancellationToken,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), StreamError> {
        tracing::info!(url = %self.config.url, symbols = ?wire_symbols, "Connecting to trade stream");

        let connect = async {
            let (ws_stream, _response) = tokio_tungstenite::connect_async(self.config.url.as_str())
                .await
                .map_err(StreamError::transport)?;
            let (mut write, read) = ws_stream.split();

            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            let request = StreamRequest::subscribe_trades(wire_symbols, id);
            let json = self.codec.encode(&request).map_err(StreamError::transport)?;
            write
                .send(Message::Text(json.into()))
                .await
                .map_err(StreamError::transport)?;
            tracing::debug!(id, channels = ?request.params, "Sent subscribe request");

            Ok::<_, StreamError>((write, read))
        };

        let (mut write, mut read) = tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            connected = tokio::time::timeout(self.config.connect_timeout, connect) => match connected {
                Ok(result) => result?,
                Err(_) => {
                    return Err(StreamError::transport(format!(
                        "connection timed out after {}ms",
                        self.config.connect_timeout.as_millis()
                    )));
                }
            },
        };

        policy.reset();
        tracing::info!("Trade stream open");
        if !emit_state(events, ConnectionState::Open).await {
            return Ok(());
        }

        loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    let _ = tokio::time::timeout(CLOSE_GRACE, write.send(Message::Close(None))).await;
                    return Ok(());
                }
                frame = tokio::time::timeout(self.config.idle_timeout, read.next()) => frame,
            };

            let Ok(frame) = frame else {
                return Err(StreamError::transport(format!(
                    "no data received for {}ms",
                    self.config.idle_timeout.as_millis()
                )));
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    if !self.handle_text(text.as_str(), events).await {
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(frame = ?frame, "Server sent close frame");
                    return Err(StreamError::Closed);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(StreamError::transport(e)),
                None => {
                    tracing::info!("WebSocket stream ended");
                    return Err(StreamError::Closed);
                }
            }
        }
    }

    /// Decode one text frame and forward the result.
    ///
    /// Returns `false` once the subscriber has gone away.
    async fn handle_text(&self, text: &str, events: &mpsc::Sender<StreamEvent>) -> bool {
        let message = match self.codec.decode(text) {
            Ok(message) => message,
            Err(e) => return report(events, StreamError::parse(e)).await,
        };

        match message {
            StreamMessage::Trade(trade) => match trade.into_event() {
                Ok(event) => {
                    metrics::record_trade_received();
                    if !matches!(map_symbol(&event.symbol), SymbolMapping::Currency(_)) {
                        metrics::record_trade_ignored();
                    }
                    emit(events, StreamEvent::Trade(event)).await
                }
                Err(e) => report(events, StreamError::parse(e)).await,
            },
            StreamMessage::Ack { id } => {
                tracing::debug!(id, "Subscription acknowledged");
                true
            }
            StreamMessage::Error { id, error } => {
                tracing::warn!(id = ?id, code = error.code, msg = %error.msg, "Request rejected");
                report(
                    events,
                    StreamError::Rejected {
                        code: error.code,
                        message: error.msg,
                    },
                )
                .await
            }
            StreamMessage::Other(event_type) => {
                tracing::trace!(event_type = %event_type, "Ignoring stream event");
                true
            }
        }
    }
}

#[async_trait]
impl TradeFeed for BinanceTradeClient {
    async fn stream(
        &self,
        wire_symbols: Vec<String>,
        events: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) {
        self.run(&wire_symbols, &events, &cancel).await;
    }
}

async fn emit(events: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    events.send(event).await.is_ok()
}

async fn emit_state(events: &mpsc::Sender<StreamEvent>, state: ConnectionState) -> bool {
    metrics::set_connection_state(&state);
    emit(events, StreamEvent::State(state)).await
}

/// Forward a non-fatal error; the connection stays open.
async fn report(events: &mpsc::Sender<StreamEvent>, error: StreamError) -> bool {
    tracing::warn!(error = %error, "Dropping stream message");
    metrics::record_stream_error(&error);
    emit(events, StreamEvent::Error(error)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    #[test]
    fn config_from_settings() {
        let settings = StreamSettings {
            url: "ws://localhost:1".to_string(),
            connect_timeout: Duration::from_secs(3),
            max_reconnect_attempts: 9,
            ..StreamSettings::default()
        };
        let config = BinanceClientConfig::from_stream_settings(&settings);
        assert_eq!(config.url, "ws://localhost:1");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.reconnect.max_attempts, 9);
    }

    #[tokio::test]
    async fn trade_frame_is_forwarded() {
        let client = BinanceTradeClient::new(BinanceClientConfig::default());
        let (tx, rx) = mpsc::channel(8);

        assert!(
            client
                .handle_text(r#"{"e":"trade","s":"BTCUSDT","p":"65000.12"}"#, &tx)
                .await
        );

        let events = drain(rx);
        assert_eq!(events.len(), 1);
        let StreamEvent::Trade(trade) = &events[0] else {
            panic!("expected trade, got {events:?}");
        };
        assert_eq!(trade.symbol, "BTCUSDT");
        assert_eq!(trade.price.to_string(), "65000.12");
    }

    #[tokio::test]
    async fn untracked_symbols_are_counted_and_still_forwarded() {
        let client = BinanceTradeClient::new(BinanceClientConfig::default());
        let (tx, rx) = mpsc::channel(8);

        assert!(
            client
                .handle_text(r#"{"e":"trade","s":"USDTUSDT","p":"0.9998"}"#, &tx)
                .await
        );
        assert!(
            client
                .handle_text(r#"{"e":"trade","s":"SOLUSDT","p":"150"}"#, &tx)
                .await
        );

        let symbols: Vec<String> = drain(rx)
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::Trade(trade) => Some(trade.symbol),
                _ => None,
            })
            .collect();
        assert_eq!(symbols, ["USDTUSDT", "SOLUSDT"]);
    }

    #[tokio::test]
    async fn state_changes_are_forwarded() {
        let (tx, rx) = mpsc::channel(8);

        assert!(emit_state(&tx, ConnectionState::Open).await);
        assert!(emit_state(&tx, ConnectionState::Reconnecting { attempt: 1 }).await);

        assert_eq!(
            drain(rx),
            vec![
                StreamEvent::State(ConnectionState::Open),
                StreamEvent::State(ConnectionState::Reconnecting { attempt: 1 }),
            ]
        );
    }

    #[tokio::test]
    async fn bad_frames_become_parse_errors() {
        let client = BinanceTradeClient::new(BinanceClientConfig::default());
        let (tx, rx) = mpsc::channel(8);

        assert!(
            client
                .handle_text(r#"{"e":"trade","s":"BTCUSDT","p":"abc"}"#, &tx)
                .await
        );
        assert!(client.handle_text("{not json", &tx).await);

        let events = drain(rx);
        assert_eq!(events.len(), 2);
        assert!(
            events
                .iter()
                .all(|e| matches!(e, StreamEvent::Error(StreamError::Parse { .. })))
        );
    }

    #[tokio::test]
    async fn acks_are_silent_and_rejections_are_reported() {
        let client = BinanceTradeClient::new(BinanceClientConfig::default());
        let (tx, rx) = mpsc::channel(8);

        assert!(client.handle_text(r#"{"result":null,"id":1}"#, &tx).await);
        assert!(
            client
                .handle_text(r#"{"error":{"code":2,"msg":"Invalid request"},"id":1}"#, &tx)
                .await
        );

        let events = drain(rx);
        assert_eq!(
            events,
            vec![StreamEvent::Error(StreamError::Rejected {
                code: 2,
                message: "Invalid request".to_string()
            })]
        );
    }

    #[tokio::test]
    async fn closed_subscriber_stops_handling() {
        let client = BinanceTradeClient::new(BinanceClientConfig::default());
        let (tx, rx) = mpsc::channel(8);
        drop(rx);

        assert!(
            !client
                .handle_text(r#"{"e":"trade","s":"BTCUSDT","p":"1"}"#, &tx)
                .await
        );
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_after_retries() {
        let config = BinanceClientConfig {
            url: "ws://127.0.0.1:9".to_string(),
            connect_timeout: Duration::from_millis(500),
            idle_timeout: Duration::from_secs(1),
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                multiplier: 2.0,
                jitter_factor: 0.0,
                max_attempts: 2,
            },
        };
        let client = BinanceTradeClient::new(config);
        let (tx, mut rx) = mpsc::channel(64);

        client
            .stream(vec!["BTCUSDT".to_string()], tx, CancellationToken::new())
            .await;

        let mut states = Vec::new();
        let mut errors = 0;
        while let Some(event) = rx.recv().await {
            match event {
                StreamEvent::State(state) => states.push(state),
                StreamEvent::Error(e) => {
                    assert_eq!(e.kind(), "transport");
                    errors += 1;
                }
                StreamEvent::Trade(_) => panic!("unexpected trade"),
            }
        }

        assert_eq!(errors, 3);
        assert_eq!(states[0], ConnectionState::Connecting);
        assert_eq!(states[1], ConnectionState::Reconnecting { attempt: 1 });
        assert_eq!(states[3], ConnectionState::Reconnecting { attempt: 2 });
        assert!(matches!(states.last(), Some(ConnectionState::Failed { .. })));
        assert!(!states.contains(&ConnectionState::Open));
    }

    #[tokio::test]
    async fn cancelled_before_start_reports_closed() {
        let client = BinanceTradeClient::new(BinanceClientConfig::default());
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        client.stream(vec!["BTCUSDT".to_string()], tx, cancel).await;

        assert_eq!(
            drain(rx),
            vec![StreamEvent::State(ConnectionState::Closed)]
        );
    }
}
