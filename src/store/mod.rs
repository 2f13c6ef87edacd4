/// Credential Store
///
/// Persistence of users and their refresh-token records. The session
/// manager only talks to the `CredentialStore` trait; errors are passed
/// through untouched so transport timeouts surface as
/// `StoreError::Unavailable`.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{PasswordHash, RefreshTokenRecord, User, UserCredentials, UserEmail};
use crate::error::StoreError;

pub use memory::InMemoryCredentialStore;
pub use postgres::{connect_with_retry, PgCredentialStore};

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// The only lookup that returns the password hash.
    async fn find_credentials_by_email(
        &self,
        email: &UserEmail,
    ) -> Result<Option<UserCredentials>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fails with `StoreError::Duplicate` when the email is taken.
    async fn create_user(&self, user: &User, password_hash: &PasswordHash) -> Result<(), StoreError>;

    async fn add_refresh_token(
        &self,
        user_id: Uuid,
        record: &RefreshTokenRecord,
    ) -> Result<(), StoreError>;

    /// Returns whether a record with this fingerprint existed.
    async fn remove_refresh_token(&self, user_id: Uuid, token_hash: &str) -> Result<bool, StoreError>;

    /// Returns how many records were removed.
    async fn remove_all_refresh_tokens(&self, user_id: Uuid) -> Result<u64, StoreError>;

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;
}
