use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, instrument};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{TokenClaims, TokenKind, TokenPair};
use shared_models::error::AppError;

/// Issues and verifies HS256 access/refresh tokens. The two kinds are signed
/// with different secrets, so one can never stand in for the other.
#[derive(Clone)]
pub struct TokenService {
    access_secret: String,
    refresh_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            access_secret: config.jwt_access_secret.clone(),
            refresh_secret: config.jwt_refresh_secret.clone(),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    fn secret(&self, kind: TokenKind) -> &str {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }

    fn issue(&self, user_id: Uuid, kind: TokenKind) -> Result<String, AppError> {
        let secret = self.secret(kind);
        if secret.is_empty() {
            return Err(AppError::Internal("JWT secret is not set".to_string()));
        }

        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = TokenClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            typ: kind,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    #[instrument(skip(self))]
    pub fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        Ok(TokenPair::bearer(
            self.issue(user_id, TokenKind::Access)?,
            self.issue(user_id, TokenKind::Refresh)?,
        ))
    }

    /// Verifies signature, expiry and kind, returning the subject.
    #[instrument(skip(self, token))]
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Uuid, AppError> {
        let secret = self.secret(kind);
        if secret.is_empty() {
            return Err(AppError::Auth("Invalid token".to_string()));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                match e.kind() {
                    ErrorKind::ExpiredSignature => AppError::Auth("Token is expired".to_string()),
                    _ => AppError::Auth("Invalid token".to_string()),
                }
            })?;

        if data.claims.typ != kind {
            return Err(AppError::Auth("Invalid token".to_string()));
        }

        Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Auth("Invalid token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{JwtTestUtils, TestConfig};
    use assert_matches::assert_matches;

    fn service() -> TokenService {
        TokenService::new(&TestConfig::default().to_app_config())
    }

    #[test]
    fn access_token_round_trips_subject() {
        let tokens = service();
        let user_id = Uuid::new_v4();
        let pair = tokens.issue_pair(user_id).unwrap();

        assert_eq!(pair.token_type, "bearer");
        assert_eq!(tokens.verify(&pair.access_token, TokenKind::Access).unwrap(), user_id);
        assert_eq!(tokens.verify(&pair.refresh_token, TokenKind::Refresh).unwrap(), user_id);
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let tokens = service();
        let pair = tokens.issue_pair(Uuid::new_v4()).unwrap();

        let result = tokens.verify(&pair.refresh_token, TokenKind::Access);
        assert_matches!(result, Err(AppError::Auth(msg)) if msg == "Invalid token");
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let config = TestConfig::default();
        let token = JwtTestUtils::create_expired_token(Uuid::new_v4(), &config.access_secret);

        let result = service().verify(&token, TokenKind::Access);
        assert_matches!(result, Err(AppError::Auth(msg)) if msg == "Token is expired");
    }

    #[test]
    fn forged_signature_is_rejected() {
        let token = JwtTestUtils::create_invalid_signature_token(Uuid::new_v4());
        assert_matches!(service().verify(&token, TokenKind::Access), Err(AppError::Auth(_)));
        assert_matches!(
            service().verify(&JwtTestUtils::create_malformed_token(), TokenKind::Access),
            Err(AppError::Auth(_))
        );
    }
}
