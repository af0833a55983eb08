/// Input validators for signup and login payloads
///
/// Each validator trims its input and returns the normalized value.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::ValidationError;

const MIN_USERNAME_LENGTH: usize = 3;
const MAX_USERNAME_LENGTH: usize = 30;
const MIN_FULL_NAME_LENGTH: usize = 2;
const MAX_FULL_NAME_LENGTH: usize = 100;
const MAX_EMAIL_LENGTH: usize = 255;
const MAX_PASSWORD_INPUT_LENGTH: usize = 128;

lazy_static! {
    // RFC 5322 simplified email regex (practical validation)
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$"
    ).unwrap();

    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9_]+$").unwrap();

    static ref FULL_NAME_REGEX: Regex = Regex::new(r"^[a-zA-Z\s]+$").unwrap();
}

/// Validates an email address, returning it lowercased
pub fn is_valid_email(email: &str) -> Result<String, ValidationError> {
    let trimmed = email.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("email"));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("email", MAX_EMAIL_LENGTH));
    }
    if !EMAIL_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("email"));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a username (letters, digits, underscore), returning it lowercased
pub fn is_valid_username(username: &str) -> Result<String, ValidationError> {
    let trimmed = username.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username"));
    }
    if trimmed.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::TooShort("username", MIN_USERNAME_LENGTH));
    }
    if trimmed.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::TooLong("username", MAX_USERNAME_LENGTH));
    }
    if !USERNAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("username"));
    }

    Ok(trimmed.to_lowercase())
}

/// Validates a full name (letters and spaces)
pub fn is_valid_full_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("full name"));
    }
    if trimmed.chars().count() < MIN_FULL_NAME_LENGTH {
        return Err(ValidationError::TooShort("full name", MIN_FULL_NAME_LENGTH));
    }
    if trimmed.chars().count() > MAX_FULL_NAME_LENGTH {
        return Err(ValidationError::TooLong("full name", MAX_FULL_NAME_LENGTH));
    }
    if !FULL_NAME_REGEX.is_match(trimmed) {
        return Err(ValidationError::InvalidFormat("full name"));
    }

    Ok(trimmed.to_string())
}

/// Validates the login form: a username or email plus a non-empty password
pub fn is_valid_login(identifier: &str, password: &str) -> Result<String, ValidationError> {
    let trimmed = identifier.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField("username or email"));
    }
    if trimmed.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::TooLong("username or email", MAX_EMAIL_LENGTH));
    }
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password"));
    }
    if password.chars().count() > MAX_PASSWORD_INPUT_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_INPUT_LENGTH));
    }

    Ok(trimmed.to_lowercase())
}
