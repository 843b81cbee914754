//! Auth Domain Events

use mos_core::events::EventMetadata;
use mos_core::{impl_domain_event, RequestContext};
use serde::Serialize;

use crate::entity::{Credential, Session};

pub const AUTH_REGISTERED: &str = "auth.registered";
pub const AUTH_LOGGED_IN: &str = "auth.logged-in";
pub const AUTH_LOGGED_OUT: &str = "auth.logged-out";
pub const AUTH_PASSWORD_CHANGED: &str = "auth.password-changed";
pub const AUTH_CREDENTIAL_REVOKED: &str = "auth.credential-revoked";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registered {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub user_id: String,
    pub username: String,
}

impl_domain_event!(Registered, AUTH_REGISTERED);

impl Registered {
    pub fn new(ctx: &RequestContext, credential: &Credential) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            user_id: credential.user_id.clone(),
            username: credential.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedIn {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub user_id: String,
    pub session_id: String,
}

impl_domain_event!(LoggedIn, AUTH_LOGGED_IN);

impl LoggedIn {
    pub fn new(ctx: &RequestContext, session: &Session) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            user_id: session.user_id.clone(),
            session_id: session.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedOut {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub user_id: String,
    pub session_id: String,
}

impl_domain_event!(LoggedOut, AUTH_LOGGED_OUT);

impl LoggedOut {
    pub fn new(ctx: &RequestContext, session: &Session) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            user_id: session.user_id.clone(),
            session_id: session.id.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChanged {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub user_id: String,
    pub sessions_revoked: u64,
}

impl_domain_event!(PasswordChanged, AUTH_PASSWORD_CHANGED);

impl PasswordChanged {
    pub fn new(ctx: &RequestContext, user_id: &str, sessions_revoked: u64) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            user_id: user_id.to_string(),
            sessions_revoked,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRevoked {
    #[serde(skip)]
    pub metadata: EventMetadata,
    pub user_id: String,
    pub sessions_revoked: u64,
}

impl_domain_event!(CredentialRevoked, AUTH_CREDENTIAL_REVOKED);

impl CredentialRevoked {
    pub fn new(ctx: &RequestContext, user_id: &str, sessions_revoked: u64) -> Self {
        Self {
            metadata: EventMetadata::from_context(ctx),
            user_id: user_id.to_string(),
            sessions_revoked,
        }
    }
}
