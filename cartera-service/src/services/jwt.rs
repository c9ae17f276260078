use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{AuthConfig, MAX_TOKEN_EXPIRY_MINUTES};
use crate::models::User;

/// JWT service for session tokens
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_minutes: i64,
}

/// Claims carried by an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: String,
    pub username: String,
    pub is_staff: bool,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub jti: String,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Result<i64, anyhow::Error> {
        self.sub
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid subject in token"))
    }
}

/// Token response returned to client
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl JwtService {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry_minutes: config.token_expiry_minutes.clamp(1, MAX_TOKEN_EXPIRY_MINUTES),
        }
    }

    pub fn generate_access_token(&self, user: &User) -> Result<TokenResponse, anyhow::Error> {
        let now = Utc::now();
        let exp = now + Duration::minutes(self.expiry_minutes);

        let claims = AccessTokenClaims {
            sub: user.user_id.to_string(),
            username: user.username.clone(),
            is_staff: user.is_staff,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode access token: {}", e))?;

        Ok(TokenResponse {
            access_token: token,
            token_type: "Bearer".to_string(),
            expires_in: self.expiry_minutes * 60,
        })
    }

    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<AccessTokenClaims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<AccessTokenClaims>(token, &self.decoding_key, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn service(secret: &str) -> JwtService {
        JwtService::new(&AuthConfig {
            jwt_secret: Secret::new(secret.to_string()),
            token_expiry_minutes: 60,
        })
    }

    fn user() -> User {
        User {
            user_id: 12,
            username: "caja1".to_string(),
            email: String::new(),
            password_hash: String::new(),
            is_staff: false,
            is_active: true,
            created_utc: Utc::now(),
            pos_id: None,
            pos_name: None,
        }
    }

    #[test]
    fn access_token_round_trip() {
        let jwt = service("secret-one");
        let token = jwt.generate_access_token(&user()).unwrap();
        assert_eq!(token.expires_in, 3600);

        let claims = jwt.validate_access_token(&token.access_token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 12);
        assert_eq!(claims.username, "caja1");
        assert!(!claims.is_staff);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = service("secret-one").generate_access_token(&user()).unwrap();
        assert!(service("secret-two")
            .validate_access_token(&token.access_token)
            .is_err());
    }

    #[test]
    fn huge_expiry_is_clamped() {
        let jwt = JwtService::new(&AuthConfig {
            jwt_secret: Secret::new("secret-one".to_string()),
            token_expiry_minutes: i64::MAX,
        });
        let token = jwt.generate_access_token(&user()).unwrap();
        assert_eq!(token.expires_in, MAX_TOKEN_EXPIRY_MINUTES * 60);
    }
}
