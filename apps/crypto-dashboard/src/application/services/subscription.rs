//! Price Subscription Facade
//!
//! Wires a [`TradeFeed`] to a [`PriceStore`] and the caller's callbacks.
//!
//! ```text
//! TradeFeed ──mpsc──► dispatcher ──► map_symbol ──► PriceStore::apply
//!                         │                               │
//!                         ├──► on_connected               └──► on_price_update
//!                         └──► on_error
//! ```
//!
//! Each call to [`PriceSubscriptionService::subscribe`] spawns one feed task
//! and one dispatcher task and returns the only handle to them. Callbacks
//! run on the dispatcher task, one at a time, in arrival order.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::application::ports::TradeFeed;
use crate::domain::currency::{CurrencyCode, SymbolMapping, map_symbol};
use crate::domain::prices::{PriceSnapshot, PriceStore, PriceTable};
use crate::domain::streaming::{ConnectionState, StreamError, StreamEvent, TradeEvent};

/// Default capacity of the feed → dispatcher channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Errors returned by [`PriceSubscriptionService::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscribeError {
    /// The requested currency set was empty.
    #[error("at least one currency must be requested")]
    NoSymbols,
}

// =============================================================================
// Callback Gate
// =============================================================================

/// Serializes callback invocation against disposal.
///
/// Reentrant so a callback may dispose its own subscription.
#[derive(Debug)]
struct CallbackGate {
    open: ReentrantMutex<Cell<bool>>,
}

impl CallbackGate {
    fn new() -> Self {
        Self {
            open: ReentrantMutex::new(Cell::new(true)),
        }
    }

    /// Run `f` unless the gate has been closed.
    fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        let open = self.open.lock();
        open.get().then(f)
    }

    /// Close the gate. Returns `true` if it was open.
    fn close(&self) -> bool {
        self.open.lock().replace(false)
    }

    fn is_open(&self) -> bool {
        self.open.lock().get()
    }
}

// =============================================================================
// Subscription Handle
// =============================================================================

/// Owned handle to one live price subscription.
///
/// Dropping the handle disposes the subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    store: Arc<PriceStore>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    gate: Arc<CallbackGate>,
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    /// Stop the subscription.
    ///
    /// Idempotent. Once this returns no callback will start, and the
    /// connection state becomes `Closed` unless it already failed.
    pub fn dispose(&self) {
        if self.gate.close() {
            tracing::debug!("Disposing price subscription");
        }
        self.cancel.cancel();
        advance_state(&self.state_tx, ConnectionState::Closed);
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.gate.is_open()
    }

    /// Consistent snapshot of current and previous prices.
    #[must_use]
    pub fn read(&self) -> PriceSnapshot {
        self.store.read()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state_tx.borrow().clone()
    }

    /// Receiver that observes every connection state change.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Move to `next` unless the current state is terminal.
fn advance_state(state_tx: &watch::Sender<ConnectionState>, next: ConnectionState) -> bool {
    let changed = state_tx.send_if_modified(|state| {
        if state.is_terminal() || *state == next {
            return false;
        }
        *state = next;
        true
    });
    if changed {
        tracing::debug!(state = %*state_tx.borrow(), "Connection state changed");
    }
    changed
}

// =============================================================================
// Subscription Service
// =============================================================================

/// Creates price subscriptions over a trade feed.
#[derive(Clone)]
pub struct PriceSubscriptionService {
    feed: Arc<dyn TradeFeed>,
    event_capacity: usize,
    initial_prices: PriceTable,
}

impl std::fmt::Debug for PriceSubscriptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceSubscriptionService")
            .field("event_capacity", &self.event_capacity)
            .field("initial_prices", &self.initial_prices)
            .finish_non_exhaustive()
    }
}

impl PriceSubscriptionService {
    /// Create a service over a trade feed.
    #[must_use]
    pub fn new(feed: Arc<dyn TradeFeed>) -> Self {
        Self {
            feed,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            initial_prices: PriceTable::initial(),
        }
    }

    /// Set the feed → dispatcher channel capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Seed new subscriptions with known prices instead of the defaults.
    #[must_use]
    pub const fn with_initial_prices(mut self, prices: PriceTable) -> Self {
        self.initial_prices = prices;
        self
    }

    /// Subscribe to live prices for a set of currencies.
    ///
    /// Must be called from within a Tokio runtime. Duplicate currencies are
    /// collapsed. Two calls create two independent connections.
    ///
    /// # Errors
    ///
    /// Returns [`SubscribeError::NoSymbols`] when `currencies` is empty.
    pub fn subscribe<P, C, E>(
        &self,
        currencies: &[CurrencyCode],
        on_price_update: P,
        on_connected: C,
        on_error: E,
    ) -> Result<SubscriptionHandle, SubscribeError>
    where
        P: FnMut(CurrencyCode, Decimal) + Send + 'static,
        C: FnMut() + Send + 'static,
        E: FnMut(&StreamError) + Send + 'static,
    {
        let currencies: BTreeSet<CurrencyCode> = currencies.iter().copied().collect();
        if currencies.is_empty() {
            return Err(SubscribeError::NoSymbols);
        }

        let wire_symbols: Vec<String> = currencies.iter().map(|c| c.wire_symbol()).collect();
        tracing::info!(symbols = ?wire_symbols, "Subscribing to trade stream");

        let store = Arc::new(PriceStore::seeded(self.initial_prices));
        let (state_tx, _) = watch::channel(ConnectionState::Connecting);
        let state_tx = Arc::new(state_tx);
        let gate = Arc::new(CallbackGate::new());
        let cancel = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::channel(self.event_capacity);

        let feed = Arc::clone(&self.feed);
        let feed_cancel = cancel.clone();
        tokio::spawn(async move {
            feed.stream(wire_symbols, event_tx, feed_cancel).await;
        });

        let dispatcher = Dispatcher {
            store: Arc::clone(&store),
            state_tx: Arc::clone(&state_tx),
            gate: Arc::clone(&gate),
            on_price_update,
            on_connected,
            on_error,
        };
        tokio::spawn(dispatcher.run(event_rx, cancel.clone()));

        Ok(SubscriptionHandle {
            store,
            state_tx,
            gate,
            cancel,
        })
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

struct Dispatcher<P, C, E> {
    store: Arc<PriceStore>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    gate: Arc<CallbackGate>,
    on_price_update: P,
    on_connected: C,
    on_error: E,
}

impl<P, C, E> Dispatcher<P, C, E>
where
    P: FnMut(CurrencyCode, Decimal) + Send + 'static,
    C: FnMut() + Send + 'static,
    E: FnMut(&StreamError) + Send + 'static,
{
    async fn run(mut self, mut events: mpsc::Receiver<StreamEvent>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match event {
                StreamEvent::Trade(trade) => self.on_trade(trade),
                StreamEvent::State(state) => self.on_state(state),
                StreamEvent::Error(error) => {
                    let on_error = &mut self.on_error;
                    self.gate.run(|| on_error(&error));
                }
            }
        }
        tracing::debug!("Subscription dispatcher stopped");
    }

    fn on_trade(&mut self, trade: TradeEvent) {
        match map_symbol(&trade.symbol) {
            SymbolMapping::Currency(currency) => {
                let store = &self.store;
                let on_price_update = &mut self.on_price_update;
                self.gate.run(|| {
                    store.apply(currency, trade.price);
                    on_price_update(currency, trade.price);
                });
            }
            SymbolMapping::Ignored => {
                tracing::trace!(symbol = %trade.symbol, "Ignoring quote-currency trade");
            }
            SymbolMapping::Unrecognized => {
                tracing::debug!(symbol = %trade.symbol, "Ignoring trade for unknown symbol");
            }
        }
    }

    fn on_state(&mut self, state: ConnectionState) {
        let opened = state == ConnectionState::Open;
        if !advance_state(&self.state_tx, state) {
            return;
        }
        if opened {
            let on_connected = &mut self.on_connected;
            self.gate.run(|| on_connected());
        }
    }
}
