use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::configuration::DatabaseSettings;
use crate::domain::{
    PasswordHash, PersonName, RefreshTokenRecord, User, UserCredentials, UserEmail,
};
use crate::error::StoreError;
use crate::store::CredentialStore;

type UserRow = (Uuid, String, String, String, DateTime<Utc>);
type RefreshTokenRow = (String, DateTime<Utc>, Option<DateTime<Utc>>, Option<String>);

/// Postgres-backed credential store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unexpected(format!("migration failed: {}", e)))
    }

    /// Waits for in-flight queries and closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Credential store connection pool closed");
    }

    async fn refresh_tokens(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let rows = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT token_hash, issued_at, expires_at, device_info
            FROM user_refresh_tokens
            WHERE user_id = $1
            ORDER BY issued_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(token_hash, issued_at, expires_at, device_info)| RefreshTokenRecord {
                token_hash,
                issued_at,
                expires_at,
                device_info,
            })
            .collect())
    }

    fn user_from_row(row: UserRow, refresh_tokens: Vec<RefreshTokenRecord>) -> User {
        let (id, first_name, last_name, email, created_at) = row;
        User {
            id,
            first_name: PersonName::from_trusted(first_name),
            last_name: PersonName::from_trusted(last_name),
            email: UserEmail::from_trusted(email),
            created_at,
            refresh_tokens,
        }
    }
}

/// Opens the connection pool, retrying a fixed number of times with a fixed
/// delay between attempts.
pub async fn connect_with_retry(settings: &DatabaseSettings) -> Result<PgPool, StoreError> {
    let attempts = settings.connect_retries.max(1);
    let connection_string = settings.connection_string();
    let mut last_error = None;

    for attempt in 1..=attempts {
        let result = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout())
            .idle_timeout(settings.idle_timeout())
            .connect(&connection_string)
            .await;

        match result {
            Ok(pool) => {
                tracing::info!(
                    host = %settings.host,
                    database = %settings.database_name,
                    "Database connection pool created successfully"
                );
                return Ok(pool);
            }
            Err(e) => {
                tracing::error!(attempt = attempt, error = %e, "Database connection failed");
                last_error = Some(e);
                if attempt < attempts {
                    tracing::info!(
                        delay_seconds = settings.retry_delay_seconds,
                        "Retrying database connection"
                    );
                    tokio::time::sleep(settings.retry_delay()).await;
                }
            }
        }
    }

    Err(StoreError::Unavailable(format!(
        "gave up after {} attempts: {}",
        attempts,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_credentials_by_email(
        &self,
        email: &UserEmail,
    ) -> Result<Option<UserCredentials>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, String, String, DateTime<Utc>, String)>(
            r#"
            SELECT id, first_name, last_name, email, created_at, password_hash
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email.as_ref())
        .fetch_optional(&self.pool)
        .await?;

        let Some((id, first_name, last_name, email, created_at, password_hash)) = row else {
            return Ok(None);
        };

        let refresh_tokens = self.refresh_tokens(id).await?;
        Ok(Some(UserCredentials {
            user: Self::user_from_row((id, first_name, last_name, email, created_at), refresh_tokens),
            password_hash: PasswordHash::new(password_hash),
        }))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, first_name, last_name, email, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let refresh_tokens = self.refresh_tokens(id).await?;
                Ok(Some(Self::user_from_row(row, refresh_tokens)))
            }
            None => Ok(None),
        }
    }

    async fn create_user(&self, user: &User, password_hash: &PasswordHash) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, first_name, last_name, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(user.first_name.as_ref())
        .bind(user.last_name.as_ref())
        .bind(user.email.as_ref())
        .bind(password_hash.as_str())
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_refresh_token(
        &self,
        user_id: Uuid,
        record: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_refresh_tokens (user_id, token_hash, issued_at, expires_at, device_info)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user_id)
        .bind(&record.token_hash)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(&record.device_info)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove_refresh_token(&self, user_id: Uuid, token_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM user_refresh_tokens WHERE user_id = $1 AND token_hash = $2",
        )
        .bind(user_id)
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_all_refresh_tokens(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM user_refresh_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
