use std::sync::Arc;

use async_trait::async_trait;
use mos_core::RequestContext;
use mos_product::acl::{AclError, OwnerDirectory};
use mos_user::UserService;

/// Answers the product module's owner checks from the user service.
pub struct UserOwnerDirectory {
    users: Arc<UserService>,
}

impl UserOwnerDirectory {
    pub fn new(users: Arc<UserService>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl OwnerDirectory for UserOwnerDirectory {
    async fn is_active_user(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
    ) -> Result<bool, AclError> {
        self.users
            .is_active_user(ctx, user_id)
            .await
            .map_err(|err| AclError::Unavailable(err.to_string()))
    }
}
