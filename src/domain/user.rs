use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{PersonName, UserEmail};

/// A bcrypt hash. Never serialized, never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash(***)")
    }
}

/// One issued refresh token.
///
/// Only the SHA-256 fingerprint of the token string is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub device_info: Option<String>,
}

impl RefreshTokenRecord {
    pub fn new(token: &str, ttl_seconds: i64, device_info: Option<String>) -> Self {
        let issued_at = Utc::now();
        Self {
            token_hash: Self::fingerprint(token),
            issued_at,
            expires_at: Some(issued_at + Duration::seconds(ttl_seconds)),
            device_info,
        }
    }

    pub fn fingerprint(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn matches(&self, token: &str) -> bool {
        self.token_hash == Self::fingerprint(token)
    }

    /// Expired records stay in the list until removed but no longer count.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// A registered account, without its password hash.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub email: UserEmail,
    pub created_at: DateTime<Utc>,
    pub refresh_tokens: Vec<RefreshTokenRecord>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.as_ref(), self.last_name.as_ref())
    }

    pub fn active_refresh_token(&self, token: &str) -> Option<&RefreshTokenRecord> {
        let now = Utc::now();
        self.refresh_tokens
            .iter()
            .find(|record| record.matches(token) && record.is_active(now))
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id.to_string(),
            email: self.email.to_string(),
            first_name: self.first_name.as_ref().to_string(),
            last_name: self.last_name.as_ref().to_string(),
            full_name: self.full_name(),
        }
    }
}

/// A user together with the hash needed to check a login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: PasswordHash,
}

/// What clients get to see of a user.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
}
