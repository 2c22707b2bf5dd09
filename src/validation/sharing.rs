use serde::Serialize;

use crate::error::{AppError, Result};

/// Minimum share code length.
pub const SHARE_CODE_MIN_LEN: usize = 6;
/// Maximum share code length.
pub const SHARE_CODE_MAX_LEN: usize = 12;
/// Minimum password length.
pub const PASSWORD_MIN_LEN: usize = 6;
/// Longest allowed update interval, in seconds.
pub const MAX_UPDATE_INTERVAL_SECS: u64 = 86_400;
/// Longest single extension, in minutes.
pub const MAX_EXTENSION_MINUTES: u64 = 1_440;

/// The outcome of a format check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn invalid(message: &str) -> Self {
        Self {
            valid: false,
            error: Some(message.to_string()),
        }
    }

    /// Converts an invalid result into `AppError::Validation`.
    pub fn into_result(self) -> Result<()> {
        match self.error {
            Some(message) if !self.valid => Err(AppError::Validation(message)),
            _ => Ok(()),
        }
    }
}

/// Trims the whitespace a keyboard tends to add around a share code.
/// Case is kept: the code is the KDF salt.
pub fn normalize_share_code(code: &str) -> String {
    code.trim().to_string()
}

/// Validates a share code.
///
/// # Arguments
///
/// * `code` - The share code to validate.
///
/// # Returns
///
/// A `ValidationResult`. Pure, cheap enough to run on every keystroke.
pub fn validate_share_code(code: &str) -> ValidationResult {
    if code.is_empty() {
        return ValidationResult::invalid("Share code is required");
    }

    let len = code.chars().count();
    if len < SHARE_CODE_MIN_LEN {
        return ValidationResult::invalid("Share code must be at least 6 characters long");
    }

    if len > SHARE_CODE_MAX_LEN {
        return ValidationResult::invalid("Share code must be at most 12 characters");
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return ValidationResult::invalid(
            "Share code can only contain letters, numbers, and hyphens",
        );
    }

    ValidationResult::ok()
}

/// Validates a sharing password.
///
/// # Arguments
///
/// * `password` - The password to validate.
///
/// # Returns
///
/// A `ValidationResult`.
pub fn validate_password(password: &str) -> ValidationResult {
    if password.is_empty() {
        return ValidationResult::invalid("Password is required");
    }

    if password.chars().count() < PASSWORD_MIN_LEN {
        return ValidationResult::invalid("Password must be at least 6 characters long");
    }

    ValidationResult::ok()
}

/// Validates an update interval in seconds.
pub fn validate_update_interval(seconds: u64) -> ValidationResult {
    if seconds == 0 {
        return ValidationResult::invalid("Update interval must be at least 1 second");
    }

    if seconds > MAX_UPDATE_INTERVAL_SECS {
        return ValidationResult::invalid("Update interval must be at most 24 hours");
    }

    ValidationResult::ok()
}

/// Validates an auto-stop extension in minutes.
pub fn validate_extension_minutes(minutes: u64) -> ValidationResult {
    if minutes == 0 {
        return ValidationResult::invalid("Extension must be at least 1 minute");
    }

    if minutes > MAX_EXTENSION_MINUTES {
        return ValidationResult::invalid("Extension must be at most 24 hours");
    }

    ValidationResult::ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_code_length_bounds() {
        assert!(!validate_share_code("ab").valid);
        assert!(!validate_share_code("abcde").valid);
        assert!(validate_share_code("abcdef").valid);
        assert!(validate_share_code("abcdefghijkl").valid);
        assert!(!validate_share_code("abcdefghijklm").valid);
    }

    #[test]
    fn share_code_charset() {
        assert!(validate_share_code("my-code").valid);
        assert!(validate_share_code("ABC-123").valid);
        assert!(!validate_share_code("abc def").valid);
        assert!(!validate_share_code("abc_def").valid);
        assert!(!validate_share_code("código1").valid);
    }

    #[test]
    fn empty_share_code_has_its_own_message() {
        let result = validate_share_code("");
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("Share code is required"));
    }

    #[test]
    fn password_rules() {
        assert!(!validate_password("").valid);
        assert!(!validate_password("12345").valid);
        assert!(validate_password("secret1").valid);
        assert!(validate_password("123456").valid);
    }

    #[test]
    fn into_result_maps_to_validation_error() {
        assert!(validate_password("secret1").into_result().is_ok());
        match validate_password("x").into_result() {
            Err(AppError::Validation(msg)) => assert!(msg.contains("at least 6")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn interval_and_extension_bounds() {
        assert!(!validate_update_interval(0).valid);
        assert!(validate_update_interval(60).valid);
        assert!(!validate_update_interval(86_401).valid);
        assert!(!validate_extension_minutes(0).valid);
        assert!(validate_extension_minutes(30).valid);
        assert!(!validate_extension_minutes(1_441).valid);
    }

    #[test]
    fn normalize_trims_but_keeps_case() {
        assert_eq!(normalize_share_code("  My-Code \n"), "My-Code");
    }
}
