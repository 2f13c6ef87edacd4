/// JWT Token Issuing and Verification
///
/// Access and refresh tokens are HS256 JWTs signed with two different
/// secrets, so a token of one kind never verifies as the other.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::configuration::JwtSettings;
use crate::error::{ConfigError, TokenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl SigningKeys {
    fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }
}

/// Issues and verifies both token kinds.
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
    issuer: String,
    validation: Validation,
}

impl TokenService {
    /// # Errors
    /// Missing or shared secrets are a configuration error, reported once
    /// at startup.
    pub fn new(settings: &JwtSettings) -> Result<Self, ConfigError> {
        settings.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&settings.issuer]);
        validation.leeway = 0;

        Ok(Self {
            access: SigningKeys::new(&settings.access_secret, settings.access_token_expiry),
            refresh: SigningKeys::new(&settings.refresh_secret, settings.refresh_token_expiry),
            issuer: settings.issuer.clone(),
            validation,
        })
    }

    fn keys(&self, kind: TokenKind) -> &SigningKeys {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime of `kind` tokens in seconds.
    pub fn ttl_seconds(&self, kind: TokenKind) -> i64 {
        self.keys(kind).ttl_seconds
    }

    pub fn issue(&self, kind: TokenKind, user_id: Uuid) -> Result<String, TokenError> {
        let keys = self.keys(kind);
        let claims = Claims::new(user_id, keys.ttl_seconds, &self.issuer);
        self.sign(&claims, &keys.encoding)
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(TokenKind::Access, user_id)
    }

    pub fn issue_refresh_token(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(TokenKind::Refresh, user_id)
    }

    fn sign(&self, claims: &Claims, key: &EncodingKey) -> Result<String, TokenError> {
        encode(&Header::default(), claims, key).map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Checks signature, issuer and expiry and returns the subject.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Uuid, TokenError> {
        let claims = decode::<Claims>(token, &self.keys(kind).decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| classify(e.kind()))?;

        claims.user_id()
    }
}

fn classify(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        // a token from another issuer is treated like one signed elsewhere
        ErrorKind::InvalidSignature | ErrorKind::InvalidIssuer => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> JwtSettings {
        JwtSettings {
            access_secret: "access-secret-key-at-least-32-characters".to_string(),
            refresh_secret: "refresh-secret-key-at-least-32-characters".to_string(),
            access_token_expiry: 900,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
        }
    }

    fn service() -> TokenService {
        TokenService::new(&get_test_config()).unwrap()
    }

    #[test]
    fn test_generate_and_validate_token() {
        let service = service();
        let user_id = Uuid::new_v4();

        let access = service.issue_access_token(user_id).unwrap();
        let refresh = service.issue_refresh_token(user_id).unwrap();

        assert_eq!(service.verify(&access, TokenKind::Access).unwrap(), user_id);
        assert_eq!(service.verify(&refresh, TokenKind::Refresh).unwrap(), user_id);
    }

    #[test]
    fn test_tokens_are_never_identical() {
        let service = service();
        let user_id = Uuid::new_v4();

        let first = service.issue_access_token(user_id).unwrap();
        let second = service.issue_access_token(user_id).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_token_kinds_are_not_interchangeable() {
        let service = service();
        let user_id = Uuid::new_v4();

        let access = service.issue_access_token(user_id).unwrap();
        let refresh = service.issue_refresh_token(user_id).unwrap();

        assert_eq!(
            service.verify(&access, TokenKind::Refresh),
            Err(TokenError::InvalidSignature)
        );
        assert_eq!(
            service.verify(&refresh, TokenKind::Access),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_foreign_secret_fails() {
        let mut other = get_test_config();
        other.access_secret = "some-other-access-secret-entirely".to_string();
        let foreign = TokenService::new(&other).unwrap();

        let token = foreign.issue_access_token(Uuid::new_v4()).unwrap();
        assert_eq!(
            service().verify(&token, TokenKind::Access),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_invalid_token() {
        assert_eq!(
            service().verify("invalid.token.here", TokenKind::Access),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            service().verify("", TokenKind::Access),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_tampered_token() {
        let service = service();
        let token = service.issue_access_token(Uuid::new_v4()).unwrap();

        let tampered = format!("{}X", token);
        assert!(service.verify(&tampered, TokenKind::Access).is_err());
    }

    #[test]
    fn test_expired_token() {
        let service = service();
        let user_id = Uuid::new_v4();

        let mut claims = Claims::new(user_id, 900, "test");
        claims.iat -= 1000;
        claims.exp = claims.iat + 900;
        let token = service.sign(&claims, &service.access.encoding).unwrap();

        assert_eq!(
            service.verify(&token, TokenKind::Access),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_wrong_issuer() {
        let service = service();
        let claims = Claims::new(Uuid::new_v4(), 900, "wrong-issuer");
        let token = service.sign(&claims, &service.access.encoding).unwrap();

        assert_eq!(
            service.verify(&token, TokenKind::Access),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn test_missing_secret_fails_at_construction() {
        let mut config = get_test_config();
        config.access_secret = String::new();
        assert!(TokenService::new(&config).is_err());
    }
}
