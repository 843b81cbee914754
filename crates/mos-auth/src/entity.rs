//! Auth Entities

use chrono::{DateTime, Duration, Utc};
use mos_common::TsidGenerator;
use serde::{Deserialize, Serialize};

/// Password credential for one user.
///
/// Deletion is soft: a deleted credential keeps its row so the username
/// stays reserved. Only an active, undeleted credential can log in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    pub user_id: String,
    /// Login name, lowercase
    pub username: String,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            user_id: user_id.into(),
            username: username.into(),
            password_hash: password_hash.into(),
            active: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn can_log_in(&self) -> bool {
        self.active && !self.is_deleted()
    }
}

/// Bearer session. Only the SHA-256 of the token is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, token_hash: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            user_id: user_id.into(),
            token_hash: token_hash.into(),
            created_at: now,
            expires_at: now + ttl,
            revoked_at: None,
        }
    }

    /// Not revoked and not yet expired at `now`.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && now < self.expires_at
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub user_id: String,
    pub username: String,
}

/// Result of a successful login. The raw token is only ever returned here.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub token: String,
    pub session: Session,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_usability() {
        let session = Session::new("u1", "hash", Duration::minutes(5));
        assert!(session.is_usable(Utc::now()));
        assert!(!session.is_usable(session.expires_at));

        let mut revoked = session.clone();
        revoked.revoked_at = Some(Utc::now());
        assert!(!revoked.is_usable(session.created_at));
    }

    #[test]
    fn test_credential_login_eligibility() {
        let mut credential = Credential::new("u1", "ada", "hash");
        assert!(credential.can_log_in());

        credential.active = false;
        assert!(!credential.can_log_in());
        assert!(!credential.is_deleted());

        credential.active = true;
        credential.deleted_at = Some(Utc::now());
        assert!(credential.is_deleted());
        assert!(!credential.can_log_in());
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let credential = Credential::new("u1", "ada", "$argon2id$secret");
        let json = serde_json::to_value(&credential).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["userId"], "u1");

        let session = Session::new("u1", "deadbeef", Duration::hours(1));
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("tokenHash").is_none());
        assert!(json.get("revokedAt").is_none());
    }
}
