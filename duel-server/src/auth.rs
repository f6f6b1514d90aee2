use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use duel_types::PlayerProfile;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
    #[error("token expired")]
    TokenExpired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String, // player id
    pub name: String,
    pub elo: i32,
    pub iat: u64,
    pub exp: u64,
}

/// Validates the opaque bearer token presented at the WebSocket handshake.
/// Tokens are HS256 JWTs minted by the HTTP auth surface with the shared
/// secret; dev mode accepts `id:username:elo` strings for local runs and
/// tests.
pub struct AuthService {
    secret: String,
    ttl_seconds: u64,
    dev_mode: bool,
}

impl AuthService {
    pub fn new(secret: String, ttl_seconds: u64) -> Self {
        Self {
            secret,
            ttl_seconds,
            dev_mode: false,
        }
    }

    pub fn new_dev_mode() -> Self {
        Self {
            secret: "dev".to_string(),
            ttl_seconds: 86_400,
            dev_mode: true,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<PlayerProfile, AuthError> {
        if self.dev_mode {
            return self.validate_dev_token(token);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            tracing::warn!("bearer token rejected: {:?}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            }
        })?;

        let id = Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(PlayerProfile {
            id,
            username: data.claims.name,
            elo: data.claims.elo,
        })
    }

    /// Mint a token for the given identity. The HTTP auth surface does this
    /// in production; the server only needs it for tooling and tests.
    pub fn issue_token(&self, profile: &PlayerProfile) -> Result<String, AuthError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = TokenClaims {
            sub: profile.id.to_string(),
            name: profile.username.clone(),
            elo: profile.elo,
            iat: now,
            exp: now + self.ttl_seconds,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| AuthError::InvalidToken)
    }

    fn validate_dev_token(&self, token: &str) -> Result<PlayerProfile, AuthError> {
        let mut parts = token.splitn(3, ':');
        let id = parts
            .next()
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(AuthError::InvalidToken)?;
        let username = parts.next().ok_or(AuthError::InvalidToken)?.to_string();
        let elo = parts
            .next()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(duel_core::rating::DEFAULT_RATING);

        Ok(PlayerProfile { id, username, elo })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> PlayerProfile {
        PlayerProfile {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            elo: 1320,
        }
    }

    #[test]
    fn issued_tokens_round_trip() {
        let auth = AuthService::new("test-secret".to_string(), 3600);
        let profile = profile();
        let token = auth.issue_token(&profile).unwrap();

        let validated = auth.validate_token(&token).unwrap();
        assert_eq!(validated, profile);
    }

    #[test]
    fn tokens_from_another_secret_are_rejected() {
        let minting = AuthService::new("secret-a".to_string(), 3600);
        let validating = AuthService::new("secret-b".to_string(), 3600);
        let token = minting.issue_token(&profile()).unwrap();

        assert!(matches!(
            validating.validate_token(&token),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let auth = AuthService::new("test-secret".to_string(), 3600);
        assert!(auth.validate_token("not-a-jwt").is_err());
        assert!(auth.validate_token("").is_err());
    }

    #[test]
    fn dev_mode_accepts_colon_tokens() {
        let auth = AuthService::new_dev_mode();
        let id = Uuid::new_v4();
        let token = format!("{}:bob:1450", id);

        let validated = auth.validate_token(&token).unwrap();
        assert_eq!(validated.id, id);
        assert_eq!(validated.username, "bob");
        assert_eq!(validated.elo, 1450);
    }

    #[test]
    fn dev_mode_defaults_missing_elo() {
        let auth = AuthService::new_dev_mode();
        let id = Uuid::new_v4();
        let validated = auth.validate_token(&format!("{}:carol", id)).unwrap();
        assert_eq!(validated.elo, duel_core::rating::DEFAULT_RATING);
    }
}
