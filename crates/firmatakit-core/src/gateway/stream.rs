//! Server-sent-events framing over a persistent subscription.
//!
//! The HTTP side lives outside this crate. An [`EventStream`] is what a
//! request handler holds while the peer is connected: it pulls frames with
//! [`EventStream::next_frame`] and drops the stream when the peer goes away,
//! which retires the subscription.

use tokio::sync::mpsc;

use super::registry::DeviceRegistry;
use crate::error::GatewayError;
use crate::event_bus::{Event, SubscriptionId};

/// Default number of frames buffered per stream
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

/// Frame one JSON document for server-sent delivery
pub fn sse_frame(data: &str) -> String {
    format!("data: {}\n\n", data)
}

/// A persistent subscription forwarding JSON-serialised payloads
pub struct EventStream {
    event: Event,
    subscription: SubscriptionId,
    rx: mpsc::Receiver<String>,
}

impl EventStream {
    /// Resolve `owner/device/event` and subscribe to it
    ///
    /// Fails without subscribing if the device or the event is unknown.
    pub fn open(
        registry: &DeviceRegistry,
        owner: &str,
        device: &str,
        event: &str,
        capacity: usize,
    ) -> Result<Self, GatewayError> {
        let eventer = registry
            .lookup(owner, device)
            .ok_or_else(|| GatewayError::DeviceNotFound {
                owner: owner.to_string(),
                device: device.to_string(),
            })?;

        let event = eventer
            .event(event)
            .ok_or_else(|| GatewayError::EventNotFound {
                event: event.to_string(),
            })?;

        Ok(Self::subscribe(event, capacity))
    }

    /// Subscribe persistently to an event handle
    ///
    /// Publishing never waits on the stream: when `capacity` frames are
    /// already pending the new payload is dropped.
    pub fn subscribe(event: Event, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let name = event.name().to_string();

        let subscription = event.on(move |payload| match serde_json::to_string(&payload) {
            Ok(json) => {
                if let Err(e) = tx.try_send(json) {
                    tracing::trace!("Dropping {} frame: {}", name, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialise {} payload: {}", name, e),
        });

        tracing::debug!("Streaming event {}", event.name());
        Self {
            event,
            subscription,
            rx,
        }
    }

    /// Name of the streamed event
    pub fn event_name(&self) -> &str {
        self.event.name()
    }

    /// Wait for the next frame
    ///
    /// Returns `None` once the subscription has been retired.
    pub async fn next_frame(&mut self) -> Option<String> {
        self.rx.recv().await.map(|data| sse_frame(&data))
    }

    /// Take the next frame if one is already pending
    pub fn try_next_frame(&mut self) -> Option<String> {
        self.rx.try_recv().ok().map(|data| sse_frame(&data))
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        tracing::debug!("Closing stream for {}", self.event.name());
        self.event.unsubscribe(self.subscription);
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("event", &self.event.name())
            .field("subscription", &self.subscription)
            .finish()
    }
}
