/// Secret Hashing and Verification
///
/// Passwords and refresh secrets share one slow, salted hasher (bcrypt).
/// Password strength validation lives here too.

use bcrypt::{hash, verify};

use crate::configuration::HashingSettings;
use crate::error::{AppError, ValidationError};

const MIN_PASSWORD_LENGTH: usize = 8;
const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Debug, Clone)]
pub struct SecretHasher {
    cost: u32,
}

impl SecretHasher {
    pub fn new(settings: &HashingSettings) -> Self {
        Self {
            cost: settings.cost,
        }
    }

    pub fn hash(&self, secret: &str) -> Result<String, AppError> {
        hash(secret, self.cost).map_err(|e| AppError::Internal(format!("Hashing failed: {}", e)))
    }

    /// # Errors
    /// Returns error if the stored hash is malformed
    pub fn verify(&self, secret: &str, hash: &str) -> Result<bool, AppError> {
        verify(secret, hash)
            .map_err(|e| AppError::Internal(format!("Hash verification failed: {}", e)))
    }

    /// Validate and hash a new login password
    pub fn hash_password(&self, password: &str) -> Result<String, AppError> {
        validate_password_strength(password)?;
        self.hash(password)
    }
}

/// Validate password strength requirements
///
/// Requirements:
/// - Between 8 and 128 characters
/// - At least one digit, one lowercase and one uppercase letter
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort("password", MIN_PASSWORD_LENGTH));
    }

    // bcrypt only reads the first 72 bytes; the cap also bounds hashing work
    if password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong("password", MAX_PASSWORD_LENGTH));
    }

    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_lowercase = password.chars().any(|c| c.is_lowercase());
    let has_uppercase = password.chars().any(|c| c.is_uppercase());

    if !has_digit || !has_lowercase || !has_uppercase {
        return Err(ValidationError::WeakPassword(
            "password must contain at least one digit, one lowercase letter, and one uppercase letter",
        ));
    }

    Ok(())
}
