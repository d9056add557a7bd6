//! Bearer tokens. The identity provider mints them; this server verifies
//! them and never stores credentials. `generate_token` signs with the same
//! secret for trusted tooling and tests.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Tolerated clock drift between us and the identity provider
const CLOCK_SKEW_SECONDS: u64 = 30;

/// Token payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Caller's user id
    pub sub: Uuid,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    fn issue(user_id: Uuid, email: &str, lifetime: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            sub: user_id,
            email: email.to_string(),
            exp: (now + lifetime).unix_timestamp(),
            iat: now.unix_timestamp(),
        }
    }
}

pub struct AuthService;

impl AuthService {
    /// Sign a token for `user_id` valid for the configured lifetime
    pub fn generate_token(user_id: Uuid, email: &str, config: &Config) -> AppResult<String> {
        let claims = Claims::issue(user_id, email, Duration::hours(config.jwt_expiration_hours));
        Self::sign(&claims, config)
    }

    fn sign(claims: &Claims, config: &Config) -> AppResult<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
    }

    pub fn verify_token(token: &str, config: &Config) -> AppResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_SECONDS;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            &validation,
        )?;
        Ok(data.claims)
    }

    /// Token part of an `Authorization` header value. The scheme is matched
    /// case-insensitively.
    pub fn bearer_token(header: &str) -> Option<&str> {
        let (scheme, token) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let token = token.trim();
        (!token.is_empty()).then_some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn config(secret: &str) -> Config {
        Config {
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: secret.to_string(),
            jwt_expiration_hours: 1,
            host: "127.0.0.1".to_string(),
            port: 0,
            http_timeout_seconds: 5,
            max_response_body_bytes: 1024,
            event_buffer_size: 16,
        }
    }

    #[test]
    fn test_generated_token_verifies() {
        let config = config("a-secret");
        let user_id = Uuid::now_v7();

        let token = AuthService::generate_token(user_id, "dev@example.com", &config).unwrap();
        let claims = AuthService::verify_token(&token, &config).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "dev@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_foreign_secret_is_rejected() {
        let token =
            AuthService::generate_token(Uuid::now_v7(), "dev@example.com", &config("one")).unwrap();

        let err = AuthService::verify_token(&token, &config("two")).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
        assert_eq!(err.code(), ErrorCode::Unauthenticated);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = config("a-secret");
        let claims = Claims::issue(Uuid::now_v7(), "dev@example.com", Duration::hours(-2));
        let token = AuthService::sign(&claims, &config).unwrap();

        let err = AuthService::verify_token(&token, &config).unwrap_err();
        assert!(matches!(err, AppError::TokenExpired));
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(AuthService::bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(AuthService::bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(AuthService::bearer_token("Basic abc"), None);
        assert_eq!(AuthService::bearer_token("Bearer "), None);
        assert_eq!(AuthService::bearer_token("abc"), None);
    }
}
