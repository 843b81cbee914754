//! Anti-corruption layer contract.
//!
//! The product module needs exactly one thing from the user module: whether
//! a user id names an active user. It states that need here, in its own
//! vocabulary; an adapter elsewhere maps it onto the user module.

use async_trait::async_trait;
use mos_core::RequestContext;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AclError {
    #[error("owner directory unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    /// Runs on the caller's context, so it sees the caller's open transaction.
    async fn is_active_user(
        &self,
        ctx: &mut RequestContext,
        user_id: &str,
    ) -> Result<bool, AclError>;
}
