/// Password Hashing and Verification
///
/// bcrypt with a cost factor taken from configuration.

use bcrypt::{hash, verify};

use crate::domain::{Password, PasswordHash};
use crate::error::{AppError, ConfigError, ValidationError};

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Result<Self, ConfigError> {
        if !(MIN_COST..=MAX_COST).contains(&cost) {
            return Err(ConfigError::InvalidValue(format!(
                "password.bcrypt_cost must be between {} and {}",
                MIN_COST, MAX_COST
            )));
        }
        Ok(Self { cost })
    }

    /// Salted one-way hash of `password`.
    ///
    /// # Errors
    /// Returns a validation error for an empty password.
    pub fn hash(&self, password: &Password) -> Result<PasswordHash, AppError> {
        if password.expose().is_empty() {
            return Err(ValidationError::EmptyField("password").into());
        }

        hash(password.expose(), self.cost)
            .map(PasswordHash::new)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Checks `plaintext` against `hash`.
    ///
    /// A wrong password is `Ok(false)`; only a hash that is not a bcrypt
    /// hash is an error.
    pub fn verify(&self, plaintext: &str, hash: &PasswordHash) -> Result<bool, AppError> {
        verify(plaintext, hash.as_str()).map_err(|e| {
            tracing::warn!(error = %e, "Stored password hash could not be parsed");
            ValidationError::InvalidFormat("password hash").into()
        })
    }
}
