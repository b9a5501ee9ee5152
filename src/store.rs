// src/store.rs

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

use crate::curve::{CurveError, CurveParameters, MarketState, Quoter};
use crate::units::UnitsError;

#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    Refreshed { token: String, state: MarketState },
    Removed { token: String },
}

type Listener = Arc<dyn Fn(&MarketEvent) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RefreshError {
    #[error(transparent)]
    Units(#[from] UnitsError),
    #[error(transparent)]
    Curve(#[from] CurveError),
}

struct Inner {
    params: CurveParameters,
    markets: Mutex<HashMap<String, MarketState>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// Latest market snapshot per token, shared by the views of one application.
///
/// The handle is cheap to clone and is passed down explicitly; dropping the
/// last handle tears the store down. Listeners are notified after every
/// accepted refresh and run outside the internal locks, so they may read the
/// store again.
#[derive(Clone)]
pub struct MarketStore {
    inner: Arc<Inner>,
}

impl MarketStore {
    pub fn new(params: CurveParameters) -> Self {
        Self {
            inner: Arc::new(Inner {
                params,
                markets: Mutex::new(HashMap::new()),
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn params(&self) -> &CurveParameters {
        &self.inner.params
    }

    /// Replace the snapshot for `token`. Out-of-order refreshes are accepted;
    /// the quoter tolerates stale state.
    #[instrument(skip(self, state), fields(raised = state.cumulative_quote_raised))]
    pub fn refresh(&self, token: &str, state: MarketState) -> Result<(), CurveError> {
        if !state.is_valid() {
            warn!("rejected refresh with invalid raised amount");
            return Err(CurveError::DegenerateMarketState);
        }

        let previous = self.inner.markets.lock().insert(token.to_string(), state);
        if let Some(prev) = previous {
            if state.cumulative_quote_raised < prev.cumulative_quote_raised {
                warn!(
                    previous = prev.cumulative_quote_raised,
                    "raised amount went backwards, keeping newer snapshot"
                );
            }
        } else {
            debug!("tracking new market");
        }

        self.emit(&MarketEvent::Refreshed {
            token: token.to_string(),
            state,
        });
        Ok(())
    }

    /// Refresh from the API's fixed-point raised string.
    pub fn refresh_wei(&self, token: &str, raised: &str, decimals: u32) -> Result<(), RefreshError> {
        let state = MarketState::from_wei(raised, decimals)?;
        self.refresh(token, state)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn remove(&self, token: &str) -> Option<MarketState> {
        let removed = self.inner.markets.lock().remove(token);
        if removed.is_some() {
            self.emit(&MarketEvent::Removed {
                token: token.to_string(),
            });
        }
        removed
    }

    pub fn state(&self, token: &str) -> Option<MarketState> {
        self.inner.markets.lock().get(token).copied()
    }

    /// Quoter over the latest snapshot of `token`.
    pub fn quoter(&self, token: &str) -> Option<Quoter> {
        self.state(token)
            .map(|state| Quoter::new(self.inner.params, state))
    }

    pub fn len(&self) -> usize {
        self.inner.markets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a refresh listener. It stays registered until the returned
    /// subscription is dropped or unsubscribed.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&MarketEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(listener)));
        debug!(id, "listener subscribed");

        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Drop every snapshot and listener.
    #[instrument(skip(self))]
    pub fn clear(&self) {
        let markets = {
            let mut map = self.inner.markets.lock();
            let n = map.len();
            map.clear();
            n
        };
        // Listeners may own subscriptions; drop them after the lock is released.
        let drained = std::mem::take(&mut *self.inner.listeners.lock());
        let listeners = drained.len();
        drop(drained);
        info!(markets, listeners, "market store cleared");
    }

    fn emit(&self, event: &MarketEvent) {
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl Inner {
    fn unsubscribe(&self, id: u64) {
        let removed = {
            let mut listeners = self.listeners.lock();
            listeners
                .iter()
                .position(|(lid, _)| *lid == id)
                .map(|idx| listeners.remove(idx))
        };
        // Dropped here, outside the lock.
        if removed.is_some() {
            debug!(id, "listener unsubscribed");
        }
    }
}

/// Handle for a registered listener; unsubscribes on drop.
pub struct Subscription {
    id: u64,
    store: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            inner.unsubscribe(self.id);
        }
    }
}
