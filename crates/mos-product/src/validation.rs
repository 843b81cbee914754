//! Product field normalization.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::ProductError;

const MAX_NAME_LEN: usize = 200;

fn sku_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9][A-Z0-9_-]{1,39}$").expect("sku pattern compiles"))
}

pub(crate) fn normalize_sku(raw: &str) -> Result<String, ProductError> {
    let sku = raw.trim().to_uppercase();
    if sku.is_empty() {
        return Err(ProductError::Validation("sku is required".to_string()));
    }
    if !sku_pattern().is_match(&sku) {
        return Err(ProductError::Validation(format!(
            "sku '{}' must be 2-40 characters of letters, digits, '_' or '-'",
            raw.trim()
        )));
    }
    Ok(sku)
}

pub(crate) fn normalize_name(raw: &str) -> Result<String, ProductError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ProductError::Validation("name is required".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ProductError::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

pub(crate) fn normalize_description(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(String::from)
}

pub(crate) fn check_price(price_cents: i64) -> Result<i64, ProductError> {
    if price_cents < 0 {
        return Err(ProductError::Validation(
            "price must not be negative".to_string(),
        ));
    }
    Ok(price_cents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sku_is_uppercased() {
        assert_eq!(normalize_sku(" lamp-01 ").unwrap(), "LAMP-01");
        assert!(normalize_sku("x").is_err());
        assert!(normalize_sku("-lamp").is_err());
        assert!(normalize_sku("lamp 01").is_err());
        assert!(normalize_sku("").is_err());
    }

    #[test]
    fn test_name_and_price() {
        assert_eq!(normalize_name("  Desk Lamp ").unwrap(), "Desk Lamp");
        assert!(normalize_name("   ").is_err());
        assert!(normalize_name(&"n".repeat(201)).is_err());
        assert!(check_price(0).is_ok());
        assert!(check_price(-1).is_err());
    }
}
