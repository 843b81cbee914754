//! Reaction to user lifecycle events.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use mos_core::{EventEnvelope, EventHandler, RequestContext, REQUEST_ID};
use tracing::info;

use crate::service::AuthService;

/// Name of the event the user module publishes after deleting a user.
pub const USER_DELETED: &str = "user.deleted";

/// Revokes the credential and sessions of a deleted user. Register it for
/// [`USER_DELETED`].
pub struct RevokeOnUserDeleted {
    auth: Arc<AuthService>,
}

impl RevokeOnUserDeleted {
    pub fn new(auth: Arc<AuthService>) -> Self {
        Self { auth }
    }
}

#[async_trait]
impl EventHandler for RevokeOnUserDeleted {
    fn name(&self) -> &str {
        "auth.revoke-on-user-deleted"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> anyhow::Result<()> {
        if envelope.name != USER_DELETED {
            return Ok(());
        }
        let user_id = envelope
            .payload_str("userId")
            .context("user.deleted event without userId")?;

        // Runs after the deleting transaction committed, so it gets its own.
        let mut ctx = RequestContext::new();
        if let Some(request_id) = &envelope.metadata.request_id {
            ctx.insert(REQUEST_ID, request_id.clone());
        }

        let revoked = self.auth.revoke_user(&mut ctx, user_id).await?;
        info!(user_id = %user_id, sessions_revoked = revoked, "Revoked access of deleted user");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::RegisterRequest;
    use crate::service::testing::{auth_service, RecordingProvisioner};
    use mos_core::events::EventMetadata;
    use mos_core::{impl_domain_event, EventBus, InProcessEventBus};
    use serde::Serialize;

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct UserGone {
        #[serde(skip)]
        metadata: EventMetadata,
        user_id: String,
    }

    impl_domain_event!(UserGone, USER_DELETED);

    #[tokio::test]
    async fn test_deleted_user_loses_sessions() {
        let bus = Arc::new(InProcessEventBus::new());
        let auth = Arc::new(auth_service(
            Arc::new(RecordingProvisioner::default()),
            bus.clone(),
        ));
        bus.subscribe_to(USER_DELETED, Arc::new(RevokeOnUserDeleted::new(auth.clone())));

        let registration = auth
            .register(
                &mut RequestContext::new(),
                RegisterRequest {
                    username: "ada".to_string(),
                    email: "ada@example.com".to_string(),
                    display_name: None,
                    password: "correct horse".to_string(),
                },
            )
            .await
            .unwrap();
        let grant = auth
            .login(&mut RequestContext::new(), "ada", "correct horse")
            .await
            .unwrap();

        let ctx = RequestContext::for_request("req-delete");
        let event = UserGone {
            metadata: EventMetadata::from_context(&ctx),
            user_id: registration.user_id.clone(),
        };
        bus.publish(&ctx, &event).await.unwrap();

        assert!(auth
            .authenticate(&mut RequestContext::new(), &grant.token)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_missing_user_id_fails_the_handler() {
        let bus = Arc::new(InProcessEventBus::new());
        let auth = Arc::new(auth_service(
            Arc::new(RecordingProvisioner::default()),
            bus.clone(),
        ));
        let handler = RevokeOnUserDeleted::new(auth);

        let envelope = EventEnvelope {
            name: USER_DELETED.to_string(),
            metadata: EventMetadata::from_context(&RequestContext::new()),
            payload: serde_json::json!({}),
        };
        assert!(handler.handle(&envelope).await.is_err());
    }
}
