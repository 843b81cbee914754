//! Event Bus
//!
//! Publication happens after the unit of work commits. Delivery is
//! in-process and at most once: nothing is persisted or retried, and a
//! failing handler never undoes the write that produced the event.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use super::{DomainEvent, EventEnvelope};
use crate::context::RequestContext;
use crate::error::EventBusError;

const DEFAULT_CAPACITY: usize = 256;

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(
        &self,
        ctx: &RequestContext,
        event: &dyn DomainEvent,
    ) -> Result<(), EventBusError>;

    /// Publish everything queued on the context. Failures are logged and
    /// swallowed; returns how many events were delivered cleanly.
    async fn publish_pending(&self, ctx: &mut RequestContext) -> usize {
        let events = ctx.take_pending_events();
        let mut delivered = 0;

        for event in events {
            match self.publish(ctx, event.as_ref()).await {
                Ok(()) => delivered += 1,
                Err(err) => warn!(
                    event = event.event_name(),
                    event_id = %event.metadata().event_id,
                    error = %err,
                    "Event publication failed after commit"
                ),
            }
        }

        delivered
    }
}

/// Reacts to published events. Handlers own their error reporting; the bus
/// only collects failure messages.
#[async_trait]
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()>;
}

struct Registration {
    event_name: Option<String>,
    handler: Arc<dyn EventHandler>,
}

impl Registration {
    fn matches(&self, event_name: &str) -> bool {
        self.event_name
            .as_deref()
            .map_or(true, |name| name == event_name)
    }
}

/// Dispatches to registered handlers in registration order and mirrors
/// every event onto a broadcast channel for streaming observers.
pub struct InProcessEventBus {
    handlers: RwLock<Vec<Registration>>,
    sender: broadcast::Sender<EventEnvelope>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            handlers: RwLock::new(Vec::new()),
            sender,
        }
    }

    /// Register a handler for one event name.
    pub fn subscribe_to(&self, event_name: impl Into<String>, handler: Arc<dyn EventHandler>) {
        let event_name = event_name.into();
        debug!(event = %event_name, handler = handler.name(), "Registered event handler");
        self.handlers.write().push(Registration {
            event_name: Some(event_name),
            handler,
        });
    }

    /// Register a handler for every event.
    pub fn subscribe_all(&self, handler: Arc<dyn EventHandler>) {
        debug!(handler = handler.name(), "Registered wildcard event handler");
        self.handlers.write().push(Registration {
            event_name: None,
            handler,
        });
    }

    /// Stream of every published event. Slow receivers lag rather than
    /// block publishers.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    fn handlers_for(&self, event_name: &str) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .iter()
            .filter(|registration| registration.matches(event_name))
            .map(|registration| registration.handler.clone())
            .collect()
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InProcessEventBus {
    async fn publish(
        &self,
        ctx: &RequestContext,
        event: &dyn DomainEvent,
    ) -> Result<(), EventBusError> {
        let envelope = EventEnvelope::from_event(event);

        if self.sender.send(envelope.clone()).is_err() {
            trace!(event = %envelope.name, "No stream subscribers");
        }

        let handlers = self.handlers_for(&envelope.name);
        let mut failures = Vec::new();

        for handler in handlers {
            if let Err(err) = handler.handle(&envelope).await {
                warn!(
                    event = %envelope.name,
                    handler = handler.name(),
                    request_id = ?ctx.request_id(),
                    error = %err,
                    "Event handler failed"
                );
                failures.push(format!("{}: {}", handler.name(), err));
            }
        }

        if failures.is_empty() {
            debug!(event = %envelope.name, event_id = %envelope.metadata.event_id, "Event published");
            Ok(())
        } else {
            Err(EventBusError::HandlerFailed {
                event: envelope.name,
                failures,
            })
        }
    }
}

/// Accepts and drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventBus;

#[async_trait]
impl EventBus for NoopEventBus {
    async fn publish(
        &self,
        _ctx: &RequestContext,
        event: &dyn DomainEvent,
    ) -> Result<(), EventBusError> {
        trace!(event = event.event_name(), "Dropping event");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventMetadata;
    use parking_lot::Mutex;
    use serde::Serialize;

    #[derive(Serialize)]
    struct ItemAdded {
        #[serde(skip)]
        metadata: EventMetadata,
        item: String,
    }

    crate::impl_domain_event!(ItemAdded, "cart.item-added");

    #[derive(Serialize)]
    struct CartCleared {
        #[serde(skip)]
        metadata: EventMetadata,
    }

    crate::impl_domain_event!(CartCleared, "cart.cleared");

    struct Recorder {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
            self.seen
                .lock()
                .push(format!("{}:{}", self.name, envelope.name));
            if self.fail {
                anyhow::bail!("refused");
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, seen: &Arc<Mutex<Vec<String>>>, fail: bool) -> Arc<Recorder> {
        Arc::new(Recorder {
            name,
            seen: seen.clone(),
            fail,
        })
    }

    fn item_added(ctx: &RequestContext) -> ItemAdded {
        ItemAdded {
            metadata: EventMetadata::from_context(ctx),
            item: "apple".to_string(),
        }
    }

    #[tokio::test]
    async fn test_handlers_filtered_by_name() {
        let bus = InProcessEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe_to("cart.item-added", recorder("added", &seen, false));
        bus.subscribe_to("cart.cleared", recorder("cleared", &seen, false));
        bus.subscribe_all(recorder("all", &seen, false));
        assert_eq!(bus.handler_count(), 3);

        let ctx = RequestContext::new();
        bus.publish(&ctx, &item_added(&ctx)).await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec!["added:cart.item-added".to_string(), "all:cart.item-added".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_others() {
        let bus = InProcessEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe_all(recorder("first", &seen, true));
        bus.subscribe_all(recorder("second", &seen, false));

        let ctx = RequestContext::new();
        let err = bus.publish(&ctx, &item_added(&ctx)).await.unwrap_err();

        assert_eq!(seen.lock().len(), 2);
        let EventBusError::HandlerFailed { event, failures } = err;
        assert_eq!(event, "cart.item-added");
        assert_eq!(failures, vec!["first: refused".to_string()]);
    }

    #[tokio::test]
    async fn test_stream_subscribers_receive_envelopes() {
        let bus = InProcessEventBus::with_capacity(4);
        let mut rx = bus.subscribe();

        let ctx = RequestContext::for_request("req-5");
        bus.publish(&ctx, &item_added(&ctx)).await.unwrap();

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.name, "cart.item-added");
        assert_eq!(envelope.payload_str("item"), Some("apple"));
        assert_eq!(envelope.metadata.request_id.as_deref(), Some("req-5"));
    }

    #[tokio::test]
    async fn test_publish_pending_drains_and_swallows_failures() {
        let bus = InProcessEventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe_to("cart.cleared", recorder("cleared", &seen, true));

        let mut ctx = RequestContext::new();
        let added = item_added(&ctx);
        ctx.record_event(added);
        ctx.record_event(CartCleared {
            metadata: EventMetadata::from_context(&ctx),
        });

        let delivered = bus.publish_pending(&mut ctx).await;
        assert_eq!(delivered, 1);
        assert!(ctx.pending_events().is_empty());
        assert_eq!(*seen.lock(), vec!["cleared:cart.cleared".to_string()]);
    }

    #[tokio::test]
    async fn test_noop_bus_accepts_everything() {
        let mut ctx = RequestContext::new();
        let added = item_added(&ctx);
        ctx.record_event(added);
        assert_eq!(NoopEventBus.publish_pending(&mut ctx).await, 1);
    }
}
