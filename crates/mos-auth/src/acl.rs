//! Anti-corruption layer contract.
//!
//! Registration needs a user account to exist before a credential can point
//! at it. This trait is how the auth module asks for one; the adapter that
//! implements it lives outside the module.

use async_trait::async_trait;
use mos_core::RequestContext;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fields auth collects at registration and hands over to the owner of
/// user accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserRequest {
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AclError {
    #[error("user already exists: {0}")]
    Conflict(String),

    #[error("user rejected: {0}")]
    Invalid(String),

    #[error("user provisioning unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait UserProvisioner: Send + Sync {
    /// Create a user inside the unit of work already open on `ctx` and
    /// return its id. Nothing is committed or published here.
    async fn create_user(
        &self,
        ctx: &mut RequestContext,
        request: NewUserRequest,
    ) -> Result<String, AclError>;
}
