//! User Domain Events

use mos_core::events::EventMetadata;
use mos_core::{impl_domain_event, RequestContext};
use serde::Serialize;

use crate::entity::User;

pub const USER_CREATED: &str = "user.created";
pub const USER_UPDATED: &str = "user.updated";
pub const USER_DELETED: &str = "user.deleted";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub user_id: String,
    pub username: String,
    pub email: String,
}

impl_domain_event!(UserCreated, USER_CREATED);

impl UserCreated {
    pub fn new(ctx: &RequestContext, user: &User) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            user_id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdated {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub user_id: String,
    /// Names of the fields that changed
    pub changed: Vec<&'static str>,
    pub active: bool,
}

impl_domain_event!(UserUpdated, USER_UPDATED);

impl UserUpdated {
    pub fn new(ctx: &RequestContext, user: &User, changed: Vec<&'static str>) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            user_id: user.id.clone(),
            changed,
            active: user.active,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeleted {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub user_id: String,
    pub username: String,
}

impl_domain_event!(UserDeleted, USER_DELETED);

impl UserDeleted {
    pub fn new(ctx: &RequestContext, user: &User) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            user_id: user.id.clone(),
            username: user.username.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mos_core::DomainEvent;

    #[test]
    fn test_created_payload() {
        let ctx = RequestContext::for_request("req-1");
        let user = User::new("ada", "ada@example.com");
        let event = UserCreated::new(&ctx, &user);

        assert_eq!(event.event_name(), "user.created");
        let payload = event.payload();
        assert_eq!(payload["userId"], user.id.as_str());
        assert_eq!(payload["email"], "ada@example.com");
        assert_eq!(event.metadata().request_id.as_deref(), Some("req-1"));
    }

    #[test]
    fn test_updated_lists_changed_fields() {
        let ctx = RequestContext::new();
        let user = User::new("ada", "ada@example.com");
        let event = UserUpdated::new(&ctx, &user, vec!["email", "active"]);
        assert_eq!(event.payload()["changed"], serde_json::json!(["email", "active"]));
    }
}
