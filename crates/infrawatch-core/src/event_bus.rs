//! Subscription registry for push events.
//!
//! Decouples the push channel from its consumers: the connection manager
//! dispatches decoded events here, views register listeners per
//! [`EventKind`].

use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, PoisonError, RwLock},
};

use uuid::Uuid;

use crate::{
    event::{EventKind, PushEvent},
    models::{Alert, Log, Metric},
};

type Callback = dyn Fn(&PushEvent) + Send + Sync;

/// A registered listener.
///
/// Identity is fixed at construction: clones of a handle are the same
/// listener, two handles built from the same closure are not.
#[derive(Clone)]
pub struct ListenerHandle {
    id: Uuid,
    callback: Arc<Callback>,
}

impl ListenerHandle {
    /// Listener receiving every event of the kinds it is subscribed to.
    pub fn new(callback: impl Fn(&PushEvent) + Send + Sync + 'static) -> Self {
        Self {
            id: Uuid::new_v4(),
            callback: Arc::new(callback),
        }
    }

    /// Listener receiving alert payloads only.
    pub fn alerts(callback: impl Fn(&Alert) + Send + Sync + 'static) -> Self {
        Self::new(move |event| {
            if let PushEvent::Alert(alert) = event {
                callback(alert);
            }
        })
    }

    /// Listener receiving metric payloads only.
    pub fn metrics(callback: impl Fn(&Metric) + Send + Sync + 'static) -> Self {
        Self::new(move |event| {
            if let PushEvent::Metric(metric) = event {
                callback(metric);
            }
        })
    }

    /// Listener receiving log payloads only.
    pub fn logs(callback: impl Fn(&Log) + Send + Sync + 'static) -> Self {
        Self::new(move |event| {
            if let PushEvent::Log(log) = event {
                callback(log);
            }
        })
    }

    /// Unique identifier of this registration.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }
}

impl PartialEq for ListenerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ListenerHandle {}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ListenerHandle").field(&self.id).finish()
    }
}

/// Event bus keyed by [`EventKind`].
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<EventKind, Vec<ListenerHandle>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for `kind`.
    ///
    /// Returns false if it was already registered (no-op).
    pub fn subscribe(&self, kind: EventKind, handle: &ListenerHandle) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entry = listeners.entry(kind).or_default();
        if entry.contains(handle) {
            return false;
        }
        entry.push(handle.clone());
        tracing::trace!(%kind, listener = %handle.id, "listener subscribed");
        true
    }

    /// Remove `handle` from `kind`. Returns false if it was not registered.
    pub fn unsubscribe(&self, kind: EventKind, handle: &ListenerHandle) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|h| h != handle);
        let removed = entry.len() != before;
        if entry.is_empty() {
            listeners.remove(&kind);
        }
        removed
    }

    /// Deliver `event` to every listener of its kind, in registration order.
    ///
    /// Listeners run synchronously on the caller's task, outside the
    /// registry lock, so they may (un)subscribe re-entrantly. A panicking
    /// listener is logged and skipped. Returns how many listeners completed.
    pub fn dispatch(&self, event: &PushEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<ListenerHandle> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        let mut delivered = 0;
        for handle in &targets {
            match catch_unwind(AssertUnwindSafe(|| (handle.callback)(event))) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::warn!(%kind, listener = %handle.id, "listener panicked during dispatch");
                }
            }
        }
        delivered
    }

    /// Number of listeners registered for `kind`.
    #[must_use]
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }
}
