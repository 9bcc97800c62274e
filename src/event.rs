//! Single-subscriber-set event broadcasting.
//!
//! `EventChannel<T>` is the plumbing every model type uses to report its own
//! mutations. Dispatch is synchronous and ordered:
//!
//! ```text
//! emit(&event) ──► snapshot listeners ──► for each live listener: handler(&event)
//! ```
//!
//! # Snapshot semantics
//!
//! - A handler subscribed *during* an `emit` is not invoked by that `emit`.
//! - A handler unsubscribed *during* an `emit` (by an earlier handler) is
//!   skipped: every listener carries a liveness flag checked right before
//!   invocation.
//! - No lock is held while handlers run, so a handler may subscribe,
//!   unsubscribe, or tear down the very channel that is dispatching.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Opaque token identifying one registration on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Handler<T> = Box<dyn Fn(&T) + Send + Sync>;

struct Listener<T> {
    id: ListenerId,
    live: AtomicBool,
    handler: Handler<T>,
}

struct ChannelState<T> {
    next_id: u64,
    listeners: Vec<Arc<Listener<T>>>,
    torn_down: bool,
}

impl<T> ChannelState<T> {
    fn remove(&mut self, id: ListenerId) {
        if let Some(pos) = self.listeners.iter().position(|l| l.id == id) {
            let listener = self.listeners.remove(pos);
            listener.live.store(false, Ordering::Release);
        }
    }
}

/// Synchronous broadcaster with a single set of subscribers.
pub struct EventChannel<T> {
    state: Arc<Mutex<ChannelState<T>>>,
}

impl<T: 'static> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState {
                next_id: 0,
                listeners: Vec::new(),
                torn_down: false,
            })),
        }
    }

    /// Register a handler, returning its token.
    ///
    /// On a torn-down channel the handler is dropped and the token is inert.
    pub fn subscribe<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let id = ListenerId(state.next_id);
        state.next_id += 1;

        if !state.torn_down {
            state.listeners.push(Arc::new(Listener {
                id,
                live: AtomicBool::new(true),
                handler: Box::new(handler),
            }));
        }
        id
    }

    /// Register a handler, returning a revocable guard.
    pub fn on<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.subscribe(handler);
        let state: Weak<Mutex<ChannelState<T>>> = Arc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.lock().remove(id);
            }
        })
    }

    /// Remove a handler. Unknown or already-removed tokens are ignored.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.state.lock().remove(id);
    }

    /// Invoke every live handler with `event`, in subscription order.
    pub fn emit(&self, event: &T) {
        let snapshot: Vec<Arc<Listener<T>>> = {
            let state = self.state.lock();
            if state.torn_down {
                return;
            }
            state.listeners.clone()
        };

        for listener in snapshot {
            if listener.live.load(Ordering::Acquire) {
                (listener.handler)(event);
            }
        }
    }

    /// Drop every handler; later `emit` and `subscribe` calls do nothing.
    pub fn teardown(&self) {
        let listeners = {
            let mut state = self.state.lock();
            state.torn_down = true;
            std::mem::take(&mut state.listeners)
        };
        for listener in &listeners {
            listener.live.store(false, Ordering::Release);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_torn_down(&self) -> bool {
        self.state.lock().torn_down
    }
}

impl<T: 'static> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for EventChannel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EventChannel")
            .field("listeners", &state.listeners.len())
            .field("torn_down", &state.torn_down)
            .finish()
    }
}

// =============================================================================
// Subscription
// =============================================================================

type Revoke = Box<dyn FnOnce() + Send>;

/// Revocable registration handle.
///
/// `revoke()` is idempotent. Dropping a `Subscription` does **not** revoke it;
/// registrations live until revoked or until their channel is torn down.
pub struct Subscription {
    revoke: Mutex<Option<Revoke>>,
}

impl Subscription {
    pub fn new<F>(revoke: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            revoke: Mutex::new(Some(Box::new(revoke))),
        }
    }

    /// A subscription with nothing to revoke.
    pub fn noop() -> Self {
        Self {
            revoke: Mutex::new(None),
        }
    }

    /// Combine several subscriptions; revoking the result revokes each in order.
    pub fn all(subscriptions: Vec<Subscription>) -> Self {
        Self::new(move || {
            for subscription in &subscriptions {
                subscription.revoke();
            }
        })
    }

    pub fn revoke(&self) {
        // Take first: the revoke closure may re-enter and must not find the lock held.
        let revoke = self.revoke.lock().take();
        if let Some(revoke) = revoke {
            revoke();
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoke.lock().is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("revoked", &self.is_revoked())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
