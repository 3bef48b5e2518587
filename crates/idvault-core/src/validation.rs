//! Input validation shared by the data model.
//!
//! Rejects empty or malformed input before any record is touched.

use crate::error::{CoreError, Result};

/// Maximum length for any free-text field.
pub const MAX_FIELD_LEN: usize = 256;

/// Require a trimmed, non-empty, bounded value.
pub fn require_text<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(format!("{what} must not be empty")));
    }
    if trimmed.len() > MAX_FIELD_LEN {
        return Err(CoreError::InvalidInput(format!(
            "{what} exceeds {MAX_FIELD_LEN} bytes"
        )));
    }
    Ok(trimmed)
}

/// Like [`require_text`] but allows an empty value.
pub fn optional_text<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.len() > MAX_FIELD_LEN {
        return Err(CoreError::InvalidInput(format!(
            "{what} exceeds {MAX_FIELD_LEN} bytes"
        )));
    }
    Ok(trimmed)
}

/// Minimal structural check for an email address.
pub fn require_email(value: &str) -> Result<&str> {
    let email = require_text("email", value)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(CoreError::InvalidInput(format!("malformed email: {email}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_text_trims() {
        assert_eq!(require_text("name", "  anna ").unwrap(), "anna");
    }

    #[test]
    fn test_require_text_rejects_blank() {
        assert!(require_text("name", "   ").is_err());
    }

    #[test]
    fn test_require_text_rejects_oversized() {
        let long = "x".repeat(MAX_FIELD_LEN + 1);
        assert!(require_text("name", &long).is_err());
    }

    #[test]
    fn test_optional_text_allows_empty() {
        assert_eq!(optional_text("phone", "").unwrap(), "");
    }

    #[test]
    fn test_email_shape() {
        assert!(require_email("anna@x.io").is_ok());
        assert!(require_email("anna").is_err());
        assert!(require_email("@x.io").is_err());
        assert!(require_email("anna@localhost").is_err());
    }
}
