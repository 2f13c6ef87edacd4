use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{PasswordHash, RefreshTokenRecord, User, UserCredentials, UserEmail};
use crate::error::StoreError;
use crate::store::CredentialStore;

/// Process-local store with the same semantics as the Postgres one.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    users: Mutex<HashMap<Uuid, UserCredentials>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn users(&self) -> Result<MutexGuard<'_, HashMap<Uuid, UserCredentials>>, StoreError> {
        self.users
            .lock()
            .map_err(|_| StoreError::Unexpected("user map lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_credentials_by_email(
        &self,
        email: &UserEmail,
    ) -> Result<Option<UserCredentials>, StoreError> {
        Ok(self
            .users()?
            .values()
            .find(|stored| &stored.user.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users()?.get(&id).map(|stored| stored.user.clone()))
    }

    async fn create_user(&self, user: &User, password_hash: &PasswordHash) -> Result<(), StoreError> {
        let mut users = self.users()?;
        if users.values().any(|stored| stored.user.email == user.email) {
            return Err(StoreError::Duplicate(format!("email {} already exists", user.email)));
        }
        if users.contains_key(&user.id) {
            return Err(StoreError::Duplicate(format!("user id {} already exists", user.id)));
        }

        users.insert(
            user.id,
            UserCredentials {
                user: user.clone(),
                password_hash: password_hash.clone(),
            },
        );
        Ok(())
    }

    async fn add_refresh_token(
        &self,
        user_id: Uuid,
        record: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        let mut users = self.users()?;
        let stored = users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Unexpected(format!("user {} does not exist", user_id)))?;

        let tokens = &mut stored.user.refresh_tokens;
        if tokens.iter().any(|existing| existing.token_hash == record.token_hash) {
            return Err(StoreError::Duplicate("refresh token already recorded".to_string()));
        }
        tokens.push(record.clone());
        Ok(())
    }

    async fn remove_refresh_token(&self, user_id: Uuid, token_hash: &str) -> Result<bool, StoreError> {
        let mut users = self.users()?;
        let Some(stored) = users.get_mut(&user_id) else {
            return Ok(false);
        };

        let tokens = &mut stored.user.refresh_tokens;
        let before = tokens.len();
        tokens.retain(|record| record.token_hash != token_hash);
        Ok(tokens.len() != before)
    }

    async fn remove_all_refresh_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut users = self.users()?;
        Ok(users
            .get_mut(&user_id)
            .map(|stored| stored.user.refresh_tokens.drain(..).count() as u64)
            .unwrap_or(0))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.users()?.remove(&id).is_some())
    }
}
