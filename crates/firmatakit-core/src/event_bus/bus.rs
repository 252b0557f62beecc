//! Event Bus implementation.
//!
//! Provides the [`EventBus`] registry of named event streams, the [`Event`]
//! handle that binds a bus to one stream name, and [`after`] for delayed
//! callbacks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::events::EventPayload;

/// Subscription handle for unsubscribing from events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new unique subscription ID
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", &self.0.to_string()[..8])
    }
}

type PersistentHandler = Arc<dyn Fn(EventPayload) + Send + Sync>;
type OnceHandler = Box<dyn FnOnce(EventPayload) + Send>;

enum Handler {
    Persistent(PersistentHandler),
    Once(OnceHandler),
}

struct Subscriber {
    id: SubscriptionId,
    handler: Handler,
}

/// Registry of named event streams
///
/// Streams are created lazily on first publish or subscribe. Publishing to a
/// stream without subscribers drops the payload.
///
/// Callbacks run on the publishing thread but never under the registry lock,
/// so they may publish, subscribe or unsubscribe themselves. They should
/// still return quickly: the board's decode loop is usually the publisher.
pub struct EventBus {
    streams: Mutex<HashMap<String, Vec<Subscriber>>>,
}

impl EventBus {
    /// Create a new, empty event bus
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
        }
    }

    /// Publish a payload to every subscriber of `name`, in subscription order
    ///
    /// One-shot subscribers are removed in the same critical section that
    /// snapshots the subscriber list, so each receives at most one payload.
    /// Returns the number of callbacks invoked.
    pub fn publish(&self, name: &str, payload: impl Into<EventPayload>) -> usize {
        let payload = payload.into();

        let deliveries: Vec<Handler> = {
            let mut streams = self.streams.lock();
            let subscribers = streams.entry(name.to_string()).or_default();
            let mut deliveries = Vec::with_capacity(subscribers.len());
            let mut kept = Vec::with_capacity(subscribers.len());
            for sub in subscribers.drain(..) {
                match sub.handler {
                    Handler::Persistent(handler) => {
                        deliveries.push(Handler::Persistent(Arc::clone(&handler)));
                        kept.push(Subscriber {
                            id: sub.id,
                            handler: Handler::Persistent(handler),
                        });
                    }
                    once @ Handler::Once(_) => deliveries.push(once),
                }
            }
            *subscribers = kept;
            deliveries
        };

        if deliveries.is_empty() {
            tracing::trace!("No subscribers for {}, dropping {}", name, payload.kind());
            return 0;
        }

        let count = deliveries.len();
        for handler in deliveries {
            match handler {
                Handler::Persistent(handler) => handler(payload.clone()),
                Handler::Once(handler) => handler(payload.clone()),
            }
        }
        count
    }

    /// Subscribe to `name`
    ///
    /// A persistent subscriber receives every future publish; a non-persistent
    /// one receives exactly one and is then removed.
    pub fn subscribe<F>(&self, name: &str, handler: F, persistent: bool) -> SubscriptionId
    where
        F: Fn(EventPayload) + Send + Sync + 'static,
    {
        if persistent {
            self.insert(name, Handler::Persistent(Arc::new(handler)))
        } else {
            self.insert(name, Handler::Once(Box::new(handler)))
        }
    }

    /// Subscribe to every future publish on `name`
    pub fn on<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(EventPayload) + Send + Sync + 'static,
    {
        self.insert(name, Handler::Persistent(Arc::new(handler)))
    }

    /// Subscribe to the next publish on `name` only
    pub fn once<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: FnOnce(EventPayload) + Send + 'static,
    {
        self.insert(name, Handler::Once(Box::new(handler)))
    }

    fn insert(&self, name: &str, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId::new();
        let mut streams = self.streams.lock();
        streams
            .entry(name.to_string())
            .or_default()
            .push(Subscriber { id, handler });
        tracing::debug!("Subscription {} added to {}", id, name);
        id
    }

    /// Unsubscribe from events
    ///
    /// Returns true if the subscription was found and removed. Removing an
    /// already-delivered one-shot subscription is a no-op.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut streams = self.streams.lock();
        for (name, subscribers) in streams.iter_mut() {
            if let Some(pos) = subscribers.iter().position(|sub| sub.id == id) {
                subscribers.remove(pos);
                tracing::debug!("Subscription {} removed from {}", id, name);
                return true;
            }
        }
        false
    }

    /// Number of active subscriptions on `name`
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.streams.lock().get(name).map_or(0, Vec::len)
    }

    /// Total number of active subscriptions across all streams
    pub fn total_subscribers(&self) -> usize {
        self.streams.lock().values().map(Vec::len).sum()
    }

    /// Names of all streams created so far
    pub fn stream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.streams.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("streams", &self.stream_names())
            .field("subscribers", &self.total_subscribers())
            .finish()
    }
}

/// A named stream on a specific bus
///
/// This is what a device hands out from [`crate::Eventer::event`].
#[derive(Clone)]
pub struct Event {
    bus: Arc<EventBus>,
    name: String,
}

impl Event {
    /// Bind `name` on `bus`
    pub fn new(bus: Arc<EventBus>, name: impl Into<String>) -> Self {
        Self {
            bus,
            name: name.into(),
        }
    }

    /// Stream name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The bus this stream lives on
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Publish on this stream
    pub fn publish(&self, payload: impl Into<EventPayload>) -> usize {
        self.bus.publish(&self.name, payload)
    }

    /// Subscribe to this stream
    pub fn subscribe<F>(&self, handler: F, persistent: bool) -> SubscriptionId
    where
        F: Fn(EventPayload) + Send + Sync + 'static,
    {
        self.bus.subscribe(&self.name, handler, persistent)
    }

    /// Subscribe persistently to this stream
    pub fn on<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(EventPayload) + Send + Sync + 'static,
    {
        self.bus.on(&self.name, handler)
    }

    /// Subscribe to the next publish on this stream
    pub fn once<F>(&self, handler: F) -> SubscriptionId
    where
        F: FnOnce(EventPayload) + Send + 'static,
    {
        self.bus.once(&self.name, handler)
    }

    /// Remove a subscription made through this handle
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event").field("name", &self.name).finish()
    }
}

/// Run `callback` once on a Tokio task after `delay`
///
/// A zero delay runs the callback on the next scheduling point. Must be
/// called from within a Tokio runtime.
pub fn after<F>(delay: Duration, callback: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    tokio::spawn(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        callback();
    })
}
