use std::sync::Arc;

use async_trait::async_trait;
use mos_auth::acl::{AclError, NewUserRequest, UserProvisioner};
use mos_core::RequestContext;
use mos_user::{NewUser, UserError, UserService};
use tracing::debug;

/// Fulfils the auth module's [`UserProvisioner`] with the user service.
///
/// Uses `create_user_within`, so the user is written in the caller's unit
/// of work and its `user.created` event waits for the caller's commit.
pub struct UserServiceProvisioner {
    users: Arc<UserService>,
}

impl UserServiceProvisioner {
    pub fn new(users: Arc<UserService>) -> Self {
        Self { users }
    }
}

fn translate(err: UserError) -> AclError {
    match err {
        UserError::Conflict(detail) => AclError::Conflict(detail),
        UserError::Validation(detail) => AclError::Invalid(detail),
        other => AclError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl UserProvisioner for UserServiceProvisioner {
    async fn create_user(
        &self,
        ctx: &mut RequestContext,
        request: NewUserRequest,
    ) -> Result<String, AclError> {
        let user = self
            .users
            .create_user_within(
                ctx,
                NewUser {
                    username: request.username,
                    email: request.email,
                    display_name: request.display_name,
                },
            )
            .await
            .map_err(translate)?;

        debug!(user_id = %user.id, "Provisioned user for auth");
        Ok(user.id)
    }
}
