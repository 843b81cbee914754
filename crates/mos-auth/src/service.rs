//! Auth Service
//!
//! Both repositories handed to the service must share one unit of work;
//! registration writes a user (through the provisioner), a credential and
//! the events of both in a single transaction.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mos_core::{catch_panic, EventBus, RequestContext, UnitOfWork, UnitOfWorkExt, USER_ID};
use tracing::{debug, info, warn};

use crate::acl::{NewUserRequest, UserProvisioner};
use crate::entity::{Credential, RegisterRequest, Registration, Session, SessionGrant};
use crate::error::AuthError;
use crate::events::{CredentialRevoked, LoggedIn, LoggedOut, PasswordChanged, Registered};
use crate::password::{generate_token, hash_token, PasswordService};
use crate::repository::{CredentialRepository, SessionRepository};

const DEFAULT_SESSION_TTL_SECS: i64 = 8 * 60 * 60;

pub struct AuthService {
    credentials: Arc<dyn CredentialRepository>,
    sessions: Arc<dyn SessionRepository>,
    users: Arc<dyn UserProvisioner>,
    passwords: PasswordService,
    events: Arc<dyn EventBus>,
    session_ttl: Duration,
}

impl AuthService {
    pub fn new(
        credentials: Arc<dyn CredentialRepository>,
        sessions: Arc<dyn SessionRepository>,
        users: Arc<dyn UserProvisioner>,
        passwords: PasswordService,
        events: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            credentials,
            sessions,
            users,
            passwords,
            events,
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        }
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    fn unit_of_work(&self) -> &dyn UnitOfWork {
        self.credentials.unit_of_work()
    }

    async fn complete<T: Send>(
        &self,
        ctx: &mut RequestContext,
        result: Result<T, AuthError>,
    ) -> Result<T, AuthError> {
        let result = self.unit_of_work().defer_error_context(ctx, result).await;
        if result.is_ok() {
            self.events.publish_pending(ctx).await;
        }
        result
    }

    /// Create the user and its credential in one unit of work.
    pub async fn register(
        &self,
        ctx: &mut RequestContext,
        request: RegisterRequest,
    ) -> Result<Registration, AuthError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.create_account(ctx, request)).await;
        self.complete(ctx, result).await
    }

    async fn create_account(
        &self,
        ctx: &mut RequestContext,
        request: RegisterRequest,
    ) -> Result<Registration, AuthError> {
        let username = normalize_username(&request.username)?;
        self.passwords.validate_password(&request.password)?;

        if self
            .credentials
            .find_by_username(ctx, &username)
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict(format!(
                "username '{}' is already registered",
                username
            )));
        }

        let user_id = self
            .users
            .create_user(
                ctx,
                NewUserRequest {
                    username: username.clone(),
                    email: request.email,
                    display_name: request.display_name,
                },
            )
            .await?;

        let password_hash = self.passwords.hash_password(&request.password)?;
        let credential = Credential::new(user_id, username, password_hash);
        self.credentials.insert(ctx, &credential).await?;

        let event = Registered::new(ctx, &credential);
        ctx.record_event(event);

        info!(user_id = %credential.user_id, username = %credential.username, "User registered");
        Ok(Registration {
            user_id: credential.user_id,
            username: credential.username,
        })
    }

    /// Verify the password and open a session. On success `ctx` carries the
    /// user id.
    pub async fn login(
        &self,
        ctx: &mut RequestContext,
        username: &str,
        password: &str,
    ) -> Result<SessionGrant, AuthError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.open_session(ctx, username, password)).await;
        self.complete(ctx, result).await
    }

    async fn open_session(
        &self,
        ctx: &mut RequestContext,
        username: &str,
        password: &str,
    ) -> Result<SessionGrant, AuthError> {
        let username = username.trim().to_lowercase();
        let mut credential = match self.credentials.find_by_username(ctx, &username).await? {
            Some(credential) if credential.can_log_in() => credential,
            _ => {
                warn!(username = %username, "Login for unknown, inactive or deleted credential");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self
            .passwords
            .verify_password(password, &credential.password_hash)?
        {
            warn!(user_id = %credential.user_id, "Login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if self.passwords.needs_rehash(&credential.password_hash) {
            credential.password_hash = self.passwords.rehash(password)?;
            credential.updated_at = Utc::now();
            self.credentials.update(ctx, &credential).await?;
            debug!(user_id = %credential.user_id, "Password hash upgraded");
        }

        let token = generate_token();
        let session = Session::new(&credential.user_id, hash_token(&token), self.session_ttl);
        self.sessions.insert(ctx, &session).await?;

        ctx.insert(USER_ID, session.user_id.clone());
        let event = LoggedIn::new(ctx, &session);
        ctx.record_event(event);

        info!(user_id = %session.user_id, session_id = %session.id, "Session opened");
        Ok(SessionGrant { token, session })
    }

    /// Resolve a bearer token to its user and attach the user id to `ctx`.
    pub async fn authenticate(
        &self,
        ctx: &mut RequestContext,
        token: &str,
    ) -> Result<String, AuthError> {
        let session = self.usable_session(ctx, token).await?;
        ctx.insert(USER_ID, session.user_id.clone());
        Ok(session.user_id)
    }

    async fn usable_session(
        &self,
        ctx: &mut RequestContext,
        token: &str,
    ) -> Result<Session, AuthError> {
        let session = self
            .sessions
            .find_by_token_hash(ctx, &hash_token(token))
            .await?
            .ok_or_else(|| AuthError::Unauthorized("unknown session token".to_string()))?;

        if !session.is_usable(Utc::now()) {
            debug!(session_id = %session.id, "Rejected expired or revoked session");
            return Err(AuthError::Unauthorized(
                "session expired or revoked".to_string(),
            ));
        }
        Ok(session)
    }

    pub async fn logout(&self, ctx: &mut RequestContext, token: &str) -> Result<(), AuthError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.close_session(ctx, token)).await;
        self.complete(ctx, result).await
    }

    async fn close_session(&self, ctx: &mut RequestContext, token: &str) -> Result<(), AuthError> {
        let session = self.usable_session(ctx, token).await?;
        if !self.sessions.revoke(ctx, &session.id, Utc::now()).await? {
            return Err(AuthError::Unauthorized(
                "session expired or revoked".to_string(),
            ));
        }

        let event = LoggedOut::new(ctx, &session);
        ctx.record_event(event);

        info!(user_id = %session.user_id, session_id = %session.id, "Session closed");
        Ok(())
    }

    /// Replace the password and revoke every open session of the user.
    pub async fn change_password(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<u64, AuthError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.replace_password(
            ctx,
            user_id,
            current_password,
            new_password,
        ))
        .await;
        self.complete(ctx, result).await
    }

    async fn replace_password(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<u64, AuthError> {
        let mut credential = self
            .credentials
            .find_by_user_id(ctx, user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound(format!("credential for user {}", user_id)))?;

        if !credential.can_log_in()
            || !self
                .passwords
                .verify_password(current_password, &credential.password_hash)?
        {
            return Err(AuthError::InvalidCredentials);
        }
        if current_password == new_password {
            return Err(AuthError::Validation(
                "new password must differ from the current one".to_string(),
            ));
        }

        let now = Utc::now();
        credential.password_hash = self.passwords.hash_password(new_password)?;
        credential.updated_at = now;
        if !self.credentials.update(ctx, &credential).await? {
            return Err(AuthError::NotFound(format!("credential for user {}", user_id)));
        }
        let revoked = self.sessions.revoke_for_user(ctx, user_id, now).await?;

        let event = PasswordChanged::new(ctx, user_id, revoked);
        ctx.record_event(event);

        info!(user_id = %user_id, sessions_revoked = revoked, "Password changed");
        Ok(revoked)
    }

    /// Disable the user's credential and end all their sessions. Returns how
    /// many sessions were revoked. A user without a credential is not an
    /// error.
    pub async fn revoke_user(&self, ctx: &mut RequestContext, user_id: &str) -> Result<u64, AuthError> {
        self.unit_of_work().start_context(ctx).await?;
        let result = catch_panic(self.revoke_access(ctx, user_id)).await;
        self.complete(ctx, result).await
    }

    async fn revoke_access(&self, ctx: &mut RequestContext, user_id: &str) -> Result<u64, AuthError> {
        let now = Utc::now();
        let sessions_revoked = self.sessions.revoke_for_user(ctx, user_id, now).await?;

        let mut credential_revoked = false;
        if let Some(mut credential) = self.credentials.find_by_user_id(ctx, user_id).await? {
            if !credential.is_deleted() {
                credential.deleted_at = Some(now);
                credential.updated_at = now;
                credential_revoked = self.credentials.update(ctx, &credential).await?;
            }
        }

        if !credential_revoked && sessions_revoked == 0 {
            debug!(user_id = %user_id, "Nothing to revoke");
            return Ok(0);
        }

        let event = CredentialRevoked::new(ctx, user_id, sessions_revoked);
        ctx.record_event(event);

        info!(user_id = %user_id, sessions_revoked, "Credential revoked");
        Ok(sessions_revoked)
    }
}

fn normalize_username(raw: &str) -> Result<String, AuthError> {
    let username = raw.trim().to_lowercase();
    if username.is_empty() {
        return Err(AuthError::Validation("username is required".to_string()));
    }
    Ok(username)
}
