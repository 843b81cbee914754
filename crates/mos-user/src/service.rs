//! User Service
//!
//! Every mutating operation follows the same skeleton: start the unit of
//! work, run the body under a panic guard, let `defer_error_context`
//! commit or roll back, and publish queued events only after a commit.

use std::sync::Arc;

use mos_core::{catch_panic, EventBus, RequestContext, UnitOfWork, UnitOfWorkExt};
use tracing::{debug, info};

use crate::entity::{NewUser, User, UserUpdate};
use crate::error::UserError;
use crate::events::{UserCreated, UserDeleted, UserUpdated};
use crate::repository::UserRepository;
use crate::validation::{normalize_display_name, normalize_email, normalize_username};

const MAX_PAGE_SIZE: u64 = 100;

pub struct UserService {
    users: Arc<dyn UserRepository>,
    events: Arc<dyn EventBus>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, events: Arc<dyn EventBus>) -> Self {
        Self { users, events }
    }

    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.users.unit_of_work()
    }

    async fn complete<T: Send>(
        &self,
        ctx: &mut RequestContext,
        result: Result<T, UserError>,
    ) -> Result<T, UserError> {
        let result = self.unit_of_work().defer_error_context(ctx, result).await;
        if result.is_ok() {
            self.events.publish_pending(ctx).await;
        }
        result
    }

    pub async fn create_user(
        &self,
        ctx: &mut RequestContext,
        request: NewUser,
    ) -> Result<User, UserError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.create_user_within(ctx, request)).await;
        self.complete(ctx, result).await
    }

    /// Create a user inside a unit of work the caller already started.
    ///
    /// Writes join whatever transaction is attached to `ctx`, and the
    /// `user.created` event stays queued on `ctx` until the caller commits
    /// and publishes.
    pub async fn create_user_within(
        &self,
        ctx: &mut RequestContext,
        request: NewUser,
    ) -> Result<User, UserError> {
        let username = normalize_username(&request.username)?;
        let email = normalize_email(&request.email)?;

        if self.users.find_by_username(ctx, &username).await?.is_some() {
            return Err(UserError::Conflict(format!(
                "username '{}' is already taken",
                username
            )));
        }
        if self.users.find_by_email(ctx, &email).await?.is_some() {
            return Err(UserError::Conflict(format!(
                "email '{}' is already registered",
                email
            )));
        }

        let mut user = User::new(username, email);
        user.display_name = normalize_display_name(request.display_name.as_deref());

        self.users.insert(ctx, &user).await?;
        let event = UserCreated::new(ctx, &user);
        ctx.record_event(event);

        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    pub async fn get_user(&self, ctx: &mut RequestContext, id: &str) -> Result<User, UserError> {
        self.users
            .find_by_id(ctx, id)
            .await?
            .ok_or_else(|| UserError::not_found(id))
    }

    /// Page through users in creation order. `limit` is clamped to 1..=100.
    pub async fn list_users(
        &self,
        ctx: &mut RequestContext,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<User>, UserError> {
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        Ok(self.users.list(ctx, offset, limit).await?)
    }

    /// Whether `id` names an existing, active user.
    pub async fn is_active_user(
        &self,
        ctx: &mut RequestContext,
        id: &str,
    ) -> Result<bool, UserError> {
        Ok(self
            .users
            .find_by_id(ctx, id)
            .await?
            .is_some_and(|user| user.active))
    }

    pub async fn update_user(
        &self,
        ctx: &mut RequestContext,
        id: &str,
        update: UserUpdate,
    ) -> Result<User, UserError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.apply_update(ctx, id, update)).await;
        self.complete(ctx, result).await
    }

    async fn apply_update(
        &self,
        ctx: &mut RequestContext,
        id: &str,
        update: UserUpdate,
    ) -> Result<User, UserError> {
        let mut user = self.get_user(ctx, id).await?;
        let mut changed = Vec::new();

        if let Some(email) = update.email.as_deref() {
            let email = normalize_email(email)?;
            if email != user.email {
                if let Some(other) = self.users.find_by_email(ctx, &email).await? {
                    if other.id != user.id {
                        return Err(UserError::Conflict(format!(
                            "email '{}' is already registered",
                            email
                        )));
                    }
                }
                user.email = email;
                changed.push("email");
            }
        }

        if let Some(display_name) = update.display_name.as_deref() {
            let display_name = normalize_display_name(Some(display_name));
            if display_name != user.display_name {
                user.display_name = display_name;
                changed.push("displayName");
            }
        }

        if let Some(active) = update.active {
            if active != user.active {
                user.active = active;
                changed.push("active");
            }
        }

        if changed.is_empty() {
            debug!(user_id = %user.id, "Update changed nothing");
            return Ok(user);
        }

        user.updated_at = chrono::Utc::now();
        if !self.users.update(ctx, &user).await? {
            return Err(UserError::not_found(id));
        }
        let event = UserUpdated::new(ctx, &user, changed);
        ctx.record_event(event);

        info!(user_id = %user.id, "User updated");
        Ok(user)
    }

    pub async fn delete_user(&self, ctx: &mut RequestContext, id: &str) -> Result<User, UserError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.remove(ctx, id)).await;
        self.complete(ctx, result).await
    }

    async fn remove(&self, ctx: &mut RequestContext, id: &str) -> Result<User, UserError> {
        let user = self.get_user(ctx, id).await?;
        if !self.users.delete(ctx, id).await? {
            return Err(UserError::not_found(id));
        }
        let event = UserDeleted::new(ctx, &user);
        ctx.record_event(event);

        info!(user_id = %user.id, "User deleted");
        Ok(user)
    }
}
