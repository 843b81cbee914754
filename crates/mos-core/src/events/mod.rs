//! Domain Events
//!
//! Events are facts about something that already happened, named in past
//! tense (`user.created`, not `create.user`). A service builds the event
//! right after a successful mutation and records it on the
//! [`RequestContext`]; the event is only handed to the bus once the unit
//! of work has committed. If the transaction rolls back, queued events
//! are dropped.
//!
//! ```ignore
//! #[derive(Debug, Clone, Serialize)]
//! pub struct UserCreated {
//!     #[serde(skip)]
//!     pub metadata: EventMetadata,
//!     pub user_id: String,
//! }
//!
//! impl_domain_event!(UserCreated, "user.created");
//! ```

mod bus;

pub use bus::{EventBus, EventHandler, InProcessEventBus, NoopEventBus};

use chrono::{DateTime, Utc};
use mos_common::TsidGenerator;
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;

/// JSON body of an event, without its metadata.
pub type Payload = serde_json::Value;

pub trait DomainEvent: Send + Sync + 'static {
    /// Dotted event name, e.g. `user.created`. Handlers subscribe by name.
    fn event_name(&self) -> &'static str;

    fn payload(&self) -> Payload;

    fn metadata(&self) -> &EventMetadata;
}

/// Fields captured from the request context when the event is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    pub event_id: String,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
}

impl EventMetadata {
    pub fn from_context(ctx: &RequestContext) -> Self {
        Self {
            event_id: TsidGenerator::generate(),
            occurred_at: Utc::now(),
            request_id: ctx.request_id().map(String::from),
            principal_id: ctx.user_id().map(String::from),
        }
    }
}

/// Serialize an event body, falling back to `null` for types whose
/// `Serialize` impl can fail.
pub fn to_payload<T: Serialize>(event: &T) -> Payload {
    serde_json::to_value(event).unwrap_or(Payload::Null)
}

/// What subscribers receive: the event flattened into owned data so it can
/// be cloned into a broadcast channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub name: String,
    pub metadata: EventMetadata,
    pub payload: Payload,
}

impl EventEnvelope {
    pub fn from_event(event: &dyn DomainEvent) -> Self {
        Self {
            name: event.event_name().to_string(),
            metadata: event.metadata().clone(),
            payload: event.payload(),
        }
    }

    /// Read a string field out of the payload.
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(|value| value.as_str())
    }
}

/// Implement [`DomainEvent`] for a struct with a `metadata: EventMetadata`
/// field. The payload is the struct's own `Serialize` output, so mark the
/// metadata field `#[serde(skip)]`.
#[macro_export]
macro_rules! impl_domain_event {
    ($event:ty, $name:expr) => {
        impl $crate::events::DomainEvent for $event {
            fn event_name(&self) -> &'static str {
                $name
            }

            fn payload(&self) -> $crate::events::Payload {
                $crate::events::to_payload(self)
            }

            fn metadata(&self) -> &$crate::events::EventMetadata {
                &self.metadata
            }
        }
    };
}
