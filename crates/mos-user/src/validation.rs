//! Input normalization and validation for user fields.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::UserError;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("email pattern compiles")
    })
}

fn username_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9._-]{2,31}$").expect("username pattern compiles")
    })
}

pub(crate) fn normalize_username(raw: &str) -> Result<String, UserError> {
    let username = raw.trim().to_lowercase();
    if username.is_empty() {
        return Err(UserError::Validation("username is required".to_string()));
    }
    if !username_pattern().is_match(&username) {
        return Err(UserError::Validation(format!(
            "username '{}' must be 3-32 characters of letters, digits, '.', '_' or '-'",
            raw.trim()
        )));
    }
    Ok(username)
}

pub(crate) fn normalize_email(raw: &str) -> Result<String, UserError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(UserError::Validation("email is required".to_string()));
    }
    if !email_pattern().is_match(&email) {
        return Err(UserError::Validation(format!(
            "invalid email address format: {}",
            raw.trim()
        )));
    }
    Ok(email)
}

/// Blank display names are treated as absent.
pub(crate) fn normalize_display_name(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_pattern() {
        assert_eq!(normalize_email(" Ada@Example.com ").unwrap(), "ada@example.com");
        assert!(normalize_email("user.name+tag@example.co.uk").is_ok());
        assert!(normalize_email("invalid").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("user@").is_err());
        assert!(normalize_email("  ").is_err());
    }

    #[test]
    fn test_username_pattern() {
        assert_eq!(normalize_username("Ada.Lovelace").unwrap(), "ada.lovelace");
        assert!(normalize_username("ab").is_err());
        assert!(normalize_username("-ada").is_err());
        assert!(normalize_username("ada lovelace").is_err());
        assert!(normalize_username(&"a".repeat(33)).is_err());
    }

    #[test]
    fn test_display_name() {
        assert_eq!(normalize_display_name(Some("  Ada ")), Some("Ada".to_string()));
        assert_eq!(normalize_display_name(Some("   ")), None);
        assert_eq!(normalize_display_name(None), None);
    }
}
