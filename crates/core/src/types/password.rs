//! Password policy for every account type.
//!
//! Rules are checked in a fixed order and the first violation is reported,
//! so clients see one actionable message at a time.

/// Minimum password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 12;

/// Maximum password length in characters.
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// How many characters of each required class a password needs.
const REQUIRED_PER_CLASS: usize = 2;

/// A password policy violation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password must contain between 12 and 72 characters")]
    InvalidLength,
    #[error("password must not include spaces")]
    ContainsWhitespace,
    #[error("password must contain at least 2 lower case letters")]
    NotEnoughLowerCase,
    #[error("password must contain at least 2 upper case letters")]
    NotEnoughUpperCase,
    #[error("password must contain at least 2 digits")]
    NotEnoughDigits,
    #[error("password must contain at least 2 special characters")]
    NotEnoughSpecialChars,
}

/// Validate only the length rule.
///
/// Login requests use this instead of [`validate_password`] so that a
/// rejected login never reveals which composition rule an account's
/// password would have to satisfy.
///
/// # Errors
///
/// Returns [`PasswordError::InvalidLength`] outside 12..=72 characters.
pub fn validate_password_length(password: &str) -> Result<(), PasswordError> {
    let len = password.chars().count();
    if (MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        Ok(())
    } else {
        Err(PasswordError::InvalidLength)
    }
}

/// Validate a new password against the full policy.
///
/// # Errors
///
/// Returns the first [`PasswordError`] the password violates.
///
/// # Examples
///
/// ```
/// use medico_core::{PasswordError, validate_password};
///
/// assert!(validate_password("abCD12!?efgh").is_ok());
/// assert_eq!(validate_password("short"), Err(PasswordError::InvalidLength));
/// assert_eq!(validate_password("abcdefgh12!?"), Err(PasswordError::NotEnoughUpperCase));
/// ```
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    validate_password_length(password)?;

    if password.chars().any(char::is_whitespace) {
        return Err(PasswordError::ContainsWhitespace);
    }

    let count = |pred: fn(&char) -> bool| password.chars().filter(pred).count();

    if count(char::is_ascii_lowercase) < REQUIRED_PER_CLASS {
        return Err(PasswordError::NotEnoughLowerCase);
    }
    if count(char::is_ascii_uppercase) < REQUIRED_PER_CLASS {
        return Err(PasswordError::NotEnoughUpperCase);
    }
    if count(char::is_ascii_digit) < REQUIRED_PER_CLASS {
        return Err(PasswordError::NotEnoughDigits);
    }
    if count(char::is_ascii_punctuation) < REQUIRED_PER_CLASS {
        return Err(PasswordError::NotEnoughSpecialChars);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_password() {
        assert_eq!(validate_password("Str0ng!Pa55word?"), Ok(()));
    }

    #[test]
    fn test_length_bounds() {
        assert_eq!(validate_password("aB1!aB1!aB1"), Err(PasswordError::InvalidLength));
        assert_eq!(validate_password("aB1!aB1!aB1!"), Ok(()));

        let max = format!("aB1!aB1!{}", "x".repeat(64));
        assert_eq!(validate_password(&max), Ok(()));
        let too_long = format!("{max}x");
        assert_eq!(validate_password(&too_long), Err(PasswordError::InvalidLength));
    }

    #[test]
    fn test_whitespace_rejected() {
        assert_eq!(
            validate_password("aB1! aB1!aB1!"),
            Err(PasswordError::ContainsWhitespace)
        );
        assert_eq!(
            validate_password("aB1!\taB1!aB1!"),
            Err(PasswordError::ContainsWhitespace)
        );
    }

    #[test]
    fn test_each_class_requires_two() {
        assert_eq!(
            validate_password("a1234567ABC!!"),
            Err(PasswordError::NotEnoughLowerCase)
        );
        assert_eq!(
            validate_password("abcdefgA12!!"),
            Err(PasswordError::NotEnoughUpperCase)
        );
        assert_eq!(
            validate_password("abcdefAB1!!x"),
            Err(PasswordError::NotEnoughDigits)
        );
        assert_eq!(
            validate_password("abcdefAB12!x"),
            Err(PasswordError::NotEnoughSpecialChars)
        );
    }

    #[test]
    fn test_length_only_check_ignores_composition() {
        assert_eq!(validate_password_length("aaaaaaaaaaaa"), Ok(()));
        assert_eq!(
            validate_password_length("aaaa"),
            Err(PasswordError::InvalidLength)
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            PasswordError::NotEnoughLowerCase.to_string(),
            "password must contain at least 2 lower case letters"
        );
        assert_eq!(
            PasswordError::InvalidLength.to_string(),
            "password must contain between 12 and 72 characters"
        );
    }
}
