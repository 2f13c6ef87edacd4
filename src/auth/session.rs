/// Session Manager
///
/// Registration, login, request authentication, refresh-token rotation and
/// logout, composed from the credential store, the password hasher and
/// the token service.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::cookies::SessionCookies;
use crate::auth::jwt::{TokenKind, TokenService};
use crate::auth::password::PasswordHasher;
use crate::configuration::Settings;
use crate::domain::{NewUser, Password, PasswordHash, RefreshTokenRecord, User, UserEmail};
use crate::error::{AppError, AuthError, ConfigError, StoreError, ValidationError};
use crate::store::CredentialStore;

/// A user together with a freshly minted token pair.
#[derive(Debug)]
pub struct IssuedSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    tokens: TokenService,
    cookies: SessionCookies,
    uniform_login_errors: bool,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: PasswordHasher,
        tokens: TokenService,
        cookies: SessionCookies,
        uniform_login_errors: bool,
    ) -> Self {
        Self {
            store,
            hasher,
            tokens,
            cookies,
            uniform_login_errors,
        }
    }

    /// # Errors
    /// Fails when the JWT secrets or the bcrypt cost are unusable.
    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ConfigError> {
        let tokens = TokenService::new(&settings.jwt)?;
        let hasher = PasswordHasher::new(settings.password.bcrypt_cost)?;
        let cookies = SessionCookies::new(
            settings.cookie.clone(),
            tokens.ttl_seconds(TokenKind::Access),
            tokens.ttl_seconds(TokenKind::Refresh),
        );

        Ok(Self::new(
            store,
            hasher,
            tokens,
            cookies,
            settings.auth.uniform_login_errors,
        ))
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub async fn register(&self, new_user: NewUser) -> Result<IssuedSession, AppError> {
        if self
            .store
            .find_credentials_by_email(&new_user.email)
            .await?
            .is_some()
        {
            return Err(email_taken());
        }

        let password_hash = self.hash_password(new_user.password).await?;
        let user = User {
            id: Uuid::new_v4(),
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            email: new_user.email,
            created_at: Utc::now(),
            refresh_tokens: Vec::new(),
        };

        // a concurrent registration may have taken the email since the check
        self.store
            .create_user(&user, &password_hash)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => email_taken(),
                other => other.into(),
            })?;

        let session = self.issue_session(user).await?;
        tracing::info!(user_id = %session.user.id, "User registered successfully");
        Ok(session)
    }

    pub async fn login(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<IssuedSession, AppError> {
        let (Some(email), Some(password)) = (email, password) else {
            return Err(ValidationError::MissingField("email and password").into());
        };
        if email.trim().is_empty() || password.is_empty() {
            return Err(ValidationError::MissingField("email and password").into());
        }

        // an address that cannot be valid cannot be registered either
        let credentials = match UserEmail::parse(email) {
            Ok(email) => self.store.find_credentials_by_email(&email).await?,
            Err(_) => None,
        };
        let Some(credentials) = credentials else {
            return Err(self.login_failure(AuthError::NotRegistered));
        };

        if !self
            .verify_password(password, credentials.password_hash)
            .await?
        {
            tracing::warn!(user_id = %credentials.user.id, "Login rejected: incorrect password");
            return Err(self.login_failure(AuthError::IncorrectPassword));
        }

        let session = self.issue_session(credentials.user).await?;
        tracing::info!(user_id = %session.user.id, "User logged in successfully");
        Ok(session)
    }

    /// Resolves the access token of a request to a stored user.
    ///
    /// Every failure is an `AuthError`, which the HTTP layer reports as 401.
    pub async fn authenticate(&self, access_token: Option<&str>) -> Result<User, AppError> {
        let token = access_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let user_id = self.tokens.verify(token, TokenKind::Access).map_err(|e| {
            tracing::debug!(error = %e, "Access token rejected");
            AuthError::Token(e)
        })?;

        // the user may have been deleted after the token was issued
        self.store
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::UserNotFound.into())
    }

    /// Exchanges an active refresh token for a new pair, removing the old
    /// record.
    pub async fn refresh(&self, refresh_token: Option<&str>) -> Result<IssuedSession, AppError> {
        let token = refresh_token
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;
        let user_id = self
            .tokens
            .verify(token, TokenKind::Refresh)
            .map_err(AuthError::Token)?;

        let user = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        let token_hash = match user.active_refresh_token(token) {
            Some(record) => record.token_hash.clone(),
            None => {
                tracing::warn!(user_id = %user_id, "Attempt to use revoked refresh token");
                return Err(AuthError::RefreshTokenRevoked.into());
            }
        };

        // a concurrent refresh with the same token loses here
        if !self.store.remove_refresh_token(user_id, &token_hash).await? {
            return Err(AuthError::RefreshTokenRevoked.into());
        }

        let session = self.issue_session(user).await?;
        tracing::info!(user_id = %session.user.id, "Token refreshed successfully");
        Ok(session)
    }

    /// Removes the record behind `refresh_token`, if it still verifies.
    ///
    /// Logout always succeeds for the client; store failures are logged.
    pub async fn logout(&self, refresh_token: Option<&str>) {
        let Some(token) = refresh_token.filter(|token| !token.is_empty()) else {
            return;
        };
        let Ok(user_id) = self.tokens.verify(token, TokenKind::Refresh) else {
            return;
        };

        let token_hash = RefreshTokenRecord::fingerprint(token);
        match self.store.remove_refresh_token(user_id, &token_hash).await {
            Ok(removed) => {
                tracing::info!(user_id = %user_id, revoked = removed, "User logged out");
            }
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to revoke refresh token on logout");
            }
        }
    }

    /// Revokes every refresh token of `user`.
    pub async fn logout_everywhere(&self, user: &User) -> Result<u64, AppError> {
        let removed = self.store.remove_all_refresh_tokens(user.id).await?;
        tracing::info!(user_id = %user.id, revoked = removed, "All refresh tokens revoked for user");
        Ok(removed)
    }

    async fn issue_session(&self, mut user: User) -> Result<IssuedSession, AppError> {
        let access_token = self.tokens.issue_access_token(user.id)?;
        let refresh_token = self.tokens.issue_refresh_token(user.id)?;

        let record = RefreshTokenRecord::new(
            &refresh_token,
            self.tokens.ttl_seconds(TokenKind::Refresh),
            None,
        );
        self.store.add_refresh_token(user.id, &record).await?;
        user.refresh_tokens.push(record);

        Ok(IssuedSession {
            user,
            access_token,
            refresh_token,
        })
    }

    fn login_failure(&self, reason: AuthError) -> AppError {
        if self.uniform_login_errors {
            AuthError::InvalidCredentials.into()
        } else {
            reason.into()
        }
    }

    async fn hash_password(&self, password: Password) -> Result<PasswordHash, AppError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, hash: PasswordHash) -> Result<bool, AppError> {
        let hasher = self.hasher;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
            // a stored hash that does not parse is our fault, not the client's
            .map_err(|e| match e {
                AppError::Validation(e) => AppError::Internal(e.to_string()),
                other => other,
            })
    }
}

fn email_taken() -> AppError {
    AppError::Conflict("Email already in use.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;
    use async_trait::async_trait;

    use crate::configuration::{CookieSettings, JwtSettings};
    use crate::domain::UserCredentials;
    use crate::error::TokenError;
    use crate::store::InMemoryCredentialStore;

    /// Store double that fails in a scripted way.
    enum ScriptedStore {
        /// Every call fails as if the database were unreachable.
        Unreachable,
        /// Lookups find nothing but the insert reports the email as taken,
        /// as when another registration commits in between.
        LostRace,
    }

    fn unreachable() -> StoreError {
        StoreError::Unavailable("pool timed out while waiting for an open connection".to_string())
    }

    #[async_trait]
    impl CredentialStore for ScriptedStore {
        async fn find_credentials_by_email(
            &self,
            _email: &UserEmail,
        ) -> Result<Option<UserCredentials>, StoreError> {
            match self {
                ScriptedStore::Unreachable => Err(unreachable()),
                ScriptedStore::LostRace => Ok(None),
            }
        }

        async fn find_by_id(&self, _id: Uuid) -> Result<Option<User>, StoreError> {
            Err(unreachable())
        }

        async fn create_user(&self, user: &User, _hash: &PasswordHash) -> Result<(), StoreError> {
            match self {
                ScriptedStore::Unreachable => Err(unreachable()),
                ScriptedStore::LostRace => Err(StoreError::Duplicate(format!(
                    "duplicate key value violates unique constraint \"users_email_key\" ({})",
                    user.email
                ))),
            }
        }

        async fn add_refresh_token(
            &self,
            _user_id: Uuid,
            _record: &RefreshTokenRecord,
        ) -> Result<(), StoreError> {
            Err(unreachable())
        }

        async fn remove_refresh_token(&self, _user_id: Uuid, _hash: &str) -> Result<bool, StoreError> {
            Err(unreachable())
        }

        async fn remove_all_refresh_tokens(&self, _user_id: Uuid) -> Result<u64, StoreError> {
            Err(unreachable())
        }

        async fn delete_user(&self, _id: Uuid) -> Result<bool, StoreError> {
            Err(unreachable())
        }
    }

    fn jwt_settings() -> JwtSettings {
        JwtSettings {
            access_secret: "access-secret-for-session-tests".to_string(),
            refresh_secret: "refresh-secret-for-session-tests".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    fn manager_with(store: Arc<InMemoryCredentialStore>, uniform_login_errors: bool) -> SessionManager {
        SessionManager::new(
            store,
            PasswordHasher::new(4).unwrap(),
            TokenService::new(&jwt_settings()).unwrap(),
            SessionCookies::new(CookieSettings::default(), 900, 604800),
            uniform_login_errors,
        )
    }

    fn manager() -> (SessionManager, Arc<InMemoryCredentialStore>) {
        let store = Arc::new(InMemoryCredentialStore::new());
        (manager_with(store.clone(), false), store)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser::parse(Some("A"), Some("B"), Some(email), Some("password1")).unwrap()
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let (manager, _) = manager();

        let registered = manager.register(new_user("a@b.com")).await.unwrap();
        let logged_in = manager
            .login(Some("A@B.com"), Some("password1"))
            .await
            .unwrap();

        assert_eq!(registered.user.id, logged_in.user.id);
        assert_ne!(registered.refresh_token, logged_in.refresh_token);
    }

    #[tokio::test]
    async fn test_register_persists_refresh_record() {
        let (manager, store) = manager();

        let session = manager.register(new_user("a@b.com")).await.unwrap();
        let stored = store.find_by_id(session.user.id).await.unwrap().unwrap();

        assert_eq!(stored.refresh_tokens.len(), 1);
        assert!(stored.active_refresh_token(&session.refresh_token).is_some());
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let (manager, _) = manager();
        manager.register(new_user("a@b.com")).await.unwrap();

        let second = NewUser::parse(Some("Other"), Some("Person"), Some("A@b.com"), Some("different1"))
            .unwrap();
        let result = manager.register(second).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_login_failures_keep_their_reason() {
        let (manager, _) = manager();
        manager.register(new_user("a@b.com")).await.unwrap();

        let unknown = manager.login(Some("x@b.com"), Some("password1")).await;
        assert!(matches!(unknown, Err(AppError::Auth(AuthError::NotRegistered))));

        let wrong = manager.login(Some("a@b.com"), Some("password2")).await;
        assert!(matches!(wrong, Err(AppError::Auth(AuthError::IncorrectPassword))));
    }

    #[tokio::test]
    async fn test_uniform_login_errors() {
        let store = Arc::new(InMemoryCredentialStore::new());
        let manager = manager_with(store, true);
        manager.register(new_user("a@b.com")).await.unwrap();

        let unknown = manager.login(Some("x@b.com"), Some("password1")).await;
        let wrong = manager.login(Some("a@b.com"), Some("password2")).await;
        assert!(matches!(unknown, Err(AppError::Auth(AuthError::InvalidCredentials))));
        assert!(matches!(wrong, Err(AppError::Auth(AuthError::InvalidCredentials))));
    }

    #[tokio::test]
    async fn test_login_requires_both_fields() {
        let (manager, _) = manager();

        for (email, password) in [(None, Some("password1")), (Some("a@b.com"), None), (Some(""), Some(""))] {
            let result = manager.login(email, password).await;
            assert!(matches!(result, Err(AppError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn test_authenticate_resolves_user() {
        let (manager, _) = manager();
        let session = manager.register(new_user("a@b.com")).await.unwrap();

        let user = manager.authenticate(Some(&session.access_token)).await.unwrap();
        assert_eq!(user.id, session.user.id);
        assert_eq!(user.email.as_ref(), "a@b.com");
    }

    #[tokio::test]
    async fn test_authenticate_rejections() {
        let (manager, store) = manager();
        let session = manager.register(new_user("a@b.com")).await.unwrap();

        let missing = manager.authenticate(None).await;
        assert!(matches!(missing, Err(AppError::Auth(AuthError::MissingToken))));

        let tampered = format!("{}X", session.access_token);
        assert!(matches!(
            manager.authenticate(Some(&tampered)).await,
            Err(AppError::Auth(AuthError::Token(_)))
        ));

        let refresh_as_access = manager.authenticate(Some(&session.refresh_token)).await;
        assert!(matches!(
            refresh_as_access,
            Err(AppError::Auth(AuthError::Token(TokenError::InvalidSignature)))
        ));

        store.delete_user(session.user.id).await.unwrap();
        let deleted = manager.authenticate(Some(&session.access_token)).await;
        assert!(matches!(deleted, Err(AppError::Auth(AuthError::UserNotFound))));
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let (manager, store) = manager();
        let session = manager.register(new_user("a@b.com")).await.unwrap();

        let rotated = manager.refresh(Some(&session.refresh_token)).await.unwrap();
        assert_ne!(rotated.refresh_token, session.refresh_token);

        let stored = store.find_by_id(session.user.id).await.unwrap().unwrap();
        assert!(stored.active_refresh_token(&session.refresh_token).is_none());
        assert!(stored.active_refresh_token(&rotated.refresh_token).is_some());

        let reused = manager.refresh(Some(&session.refresh_token)).await;
        assert!(matches!(reused, Err(AppError::Auth(AuthError::RefreshTokenRevoked))));
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_record() {
        let (manager, store) = manager();
        let session = manager.register(new_user("a@b.com")).await.unwrap();

        manager.logout(Some(&session.refresh_token)).await;

        let stored = store.find_by_id(session.user.id).await.unwrap().unwrap();
        assert!(stored.refresh_tokens.is_empty());
        assert!(manager.refresh(Some(&session.refresh_token)).await.is_err());
    }

    #[tokio::test]
    async fn test_logout_ignores_garbage() {
        let (manager, _) = manager();
        manager.logout(None).await;
        manager.logout(Some("not-a-token")).await;
    }

    #[tokio::test]
    async fn test_logout_everywhere() {
        let (manager, store) = manager();
        let session = manager.register(new_user("a@b.com")).await.unwrap();
        manager.login(Some("a@b.com"), Some("password1")).await.unwrap();

        let removed = manager.logout_everywhere(&session.user).await.unwrap();
        assert_eq!(removed, 2);

        let stored = store.find_by_id(session.user.id).await.unwrap().unwrap();
        assert!(stored.refresh_tokens.is_empty());
    }

    fn scripted(store: ScriptedStore) -> SessionManager {
        SessionManager::new(
            Arc::new(store),
            PasswordHasher::new(4).unwrap(),
            TokenService::new(&jwt_settings()).unwrap(),
            SessionCookies::new(CookieSettings::default(), 900, 604800),
            false,
        )
    }

    #[tokio::test]
    async fn test_lost_registration_race_is_a_conflict() {
        let manager = scripted(ScriptedStore::LostRace);

        let err = manager.register(new_user("a@b.com")).await.unwrap_err();
        assert!(matches!(&err, AppError::Conflict(msg) if msg == "Email already in use."));
        assert_eq!(err.status_code().as_u16(), 409);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_a_generic_500() {
        let manager = scripted(ScriptedStore::Unreachable);

        let register = manager.register(new_user("a@b.com")).await.unwrap_err();
        let login = manager
            .login(Some("a@b.com"), Some("password1"))
            .await
            .unwrap_err();

        for err in [register, login] {
            assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
            assert_eq!(err.status_code().as_u16(), 500);
        }

        // logout still succeeds when the record cannot be removed
        let refresh = manager.tokens.issue_refresh_token(Uuid::new_v4()).unwrap();
        manager.logout(Some(&refresh)).await;
    }
}
