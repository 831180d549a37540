//! Session token issuing and validation.
//!
//! Tokens are HS256 JWTs whose `sub` claim carries the user id. They are
//! handed out by `POST /api/auth/token/login/` and presented as
//! `Authorization: Bearer <token>`.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Issuer claim stamped into every session token.
pub const ISSUER: &str = "Foodgram";

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// User id as a decimal string.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

impl SessionClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to sign session token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Sign a session token for `user_id` that expires after `ttl`.
pub fn issue_session_token(
    user_id: i64,
    jwt_secret: &str,
    ttl: Duration,
) -> Result<String, TokenError> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
        iss: ISSUER.to_owned(),
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

/// Validate a session JWT token and return the claims.
pub fn validate_session_token(token: &str, jwt_secret: &str) -> Result<SessionClaims, String> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;

    let token_data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => "Token has expired".to_owned(),
        jsonwebtoken::errors::ErrorKind::InvalidSignature => "Invalid token signature".to_owned(),
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => "Invalid token issuer".to_owned(),
        _ => format!("Token validation failed: {e}"),
    })?;

    Ok(token_data.claims)
}

/// SHA-256 hex digest of a token, the key under which revocations are stored.
pub fn token_hash(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-jwt-secret-for-unit-tests";

    #[test]
    fn issued_token_validates() {
        let token = issue_session_token(42, TEST_SECRET, Duration::hours(1)).unwrap();
        let claims = validate_session_token(&token, TEST_SECRET).unwrap();

        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.iss, ISSUER);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_session_token(42, TEST_SECRET, Duration::hours(1)).unwrap();
        let err = validate_session_token(&token, "wrong-secret").unwrap_err();
        assert!(err.contains("Invalid token signature"));
    }

    #[test]
    fn expired_token_is_rejected() {
        // Beyond the default 60s leeway.
        let token = issue_session_token(42, TEST_SECRET, Duration::minutes(-5)).unwrap();
        let err = validate_session_token(&token, TEST_SECRET).unwrap_err();
        assert_eq!(err, "Token has expired");
    }

    #[test]
    fn malformed_token_is_rejected() {
        assert!(validate_session_token("not-a-valid-jwt", TEST_SECRET).is_err());
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let hash = token_hash("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
