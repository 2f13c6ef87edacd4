use std::fmt;

use crate::error::ValidationError;
use crate::validators::{is_valid_email, is_valid_name, is_valid_password};

/// Lowercased, trimmed, format-checked email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserEmail(String);

impl UserEmail {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        is_valid_email(raw).map(Self)
    }

    /// Wraps a value that was validated before it was stored.
    pub(crate) fn from_trusted(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for UserEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonName(String);

impl PersonName {
    pub fn parse(field: &'static str, raw: &str) -> Result<Self, ValidationError> {
        is_valid_name(field, raw).map(Self)
    }

    pub(crate) fn from_trusted(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for PersonName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Plaintext password that passed the length policy.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        is_valid_password(raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// A registration request whose fields have all been validated.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub email: UserEmail,
    pub password: Password,
}

impl NewUser {
    pub fn parse(
        first_name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, ValidationError> {
        let first_name = first_name.ok_or(ValidationError::MissingField("first name"))?;
        let last_name = last_name.ok_or(ValidationError::MissingField("last name"))?;
        let email = email.ok_or(ValidationError::MissingField("email"))?;
        let password = password.ok_or(ValidationError::MissingField("password"))?;

        Ok(Self {
            first_name: PersonName::parse("first name", first_name)?,
            last_name: PersonName::parse("last name", last_name)?,
            email: UserEmail::parse(email)?,
            password: Password::parse(password)?,
        })
    }
}
