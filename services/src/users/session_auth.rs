//! Bearer-token authentication for protected routes.
//!
//! `RequireAuth` rejects the request with 401 unless it carries a valid,
//! unrevoked session token for an existing user. `MaybeAuth` does the same
//! check only when an `Authorization` header is present, so public
//! endpoints can personalize their output for signed-in callers.
//!
//! ```rust,ignore
//! async fn me(auth: RequireAuth) -> impl IntoResponse {
//!     format!("Hello, {}!", auth.user().username)
//! }
//! ```

use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::storage::{StoredUser, UserStorage};
use super::token::{SessionClaims, token_hash, validate_session_token};
use crate::config::Config;
use crate::database::SqlStorage;
use crate::state::AppState;

/// Authenticated user context extracted from a valid session token.
#[derive(Debug, Clone)]
pub struct RequireAuth {
    claims: SessionClaims,
    user: StoredUser,
    token_hash: String,
}

impl RequireAuth {
    pub fn user(&self) -> &StoredUser {
        &self.user
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn claims(&self) -> &SessionClaims {
        &self.claims
    }

    /// Hash of the presented token, used for revocation.
    pub fn token_hash(&self) -> &str {
        &self.token_hash
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.claims.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Optional authentication: `None` when no `Authorization` header is sent.
#[derive(Debug, Clone)]
pub struct MaybeAuth(pub Option<RequireAuth>);

impl MaybeAuth {
    pub fn user(&self) -> Option<&StoredUser> {
        self.0.as_ref().map(RequireAuth::user)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.0.as_ref().map(RequireAuth::user_id)
    }
}

/// Error type for session authentication failures.
#[derive(Debug, Serialize)]
pub struct SessionAuthError {
    #[serde(skip)]
    status: StatusCode,
    pub error: String,
    pub message: String,
}

impl SessionAuthError {
    fn unauthorized(error: &str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: error.to_owned(),
            message: message.into(),
        }
    }

    fn missing_token() -> Self {
        Self::unauthorized(
            "missing_token",
            "Authorization header with Bearer token is required",
        )
    }

    fn invalid_format() -> Self {
        Self::unauthorized(
            "invalid_format",
            "Authorization header must be in format: Bearer <token>",
        )
    }

    fn invalid_token(reason: impl Into<String>) -> Self {
        Self::unauthorized("invalid_token", reason)
    }

    fn revoked_token() -> Self {
        Self::unauthorized("invalid_token", "Token has been revoked")
    }

    fn server_error() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "server_error".to_owned(),
            message: "Could not verify credentials".to_owned(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for SessionAuthError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Extract the Bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header_value = headers.get(AUTHORIZATION)?;
    let header_str = header_value.to_str().ok()?;

    let stripped = header_str.strip_prefix("Bearer ")?.trim();
    if stripped.is_empty() {
        return None;
    }
    Some(stripped)
}

impl<S, U> FromRequestParts<AppState<S, U>> for RequireAuth
where
    S: SqlStorage,
    U: UserStorage,
{
    type Rejection = SessionAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, U>,
    ) -> Result<Self, Self::Rejection> {
        // Set by the Extension layer in `routes`.
        let jwt_secret = parts
            .extensions
            .get::<Config>()
            .map(|config| config.jwt_secret().to_owned())
            .ok_or_else(|| {
                tracing::error!("Config extension missing from request");
                SessionAuthError::server_error()
            })?;

        let token = extract_bearer_token(&parts.headers).ok_or_else(|| {
            if parts.headers.contains_key(AUTHORIZATION) {
                SessionAuthError::invalid_format()
            } else {
                SessionAuthError::missing_token()
            }
        })?;

        let claims = validate_session_token(token, &jwt_secret).map_err(|reason| {
            tracing::debug!(%reason, "Rejected session token");
            SessionAuthError::invalid_token(reason)
        })?;

        let hash = token_hash(token);
        if state.revocation_cache.is_revoked(&hash) {
            return Err(SessionAuthError::revoked_token());
        }
        match state.user_storage.is_token_revoked(&hash).await {
            Ok(true) => {
                state.revocation_cache.add_revoked(hash);
                return Err(SessionAuthError::revoked_token());
            }
            Ok(false) => {}
            Err(e) => {
                tracing::error!("Failed to check token revocation: {e}");
                return Err(SessionAuthError::server_error());
            }
        }

        let user_id = claims
            .user_id()
            .ok_or_else(|| SessionAuthError::invalid_token("Token subject is not a user id"))?;
        let user = match state.user_storage.get_user(user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(SessionAuthError::invalid_token("User no longer exists")),
            Err(e) => {
                tracing::error!("Failed to load user {user_id}: {e}");
                return Err(SessionAuthError::server_error());
            }
        };

        Ok(RequireAuth {
            claims,
            user,
            token_hash: hash,
        })
    }
}

impl<S, U> FromRequestParts<AppState<S, U>> for MaybeAuth
where
    S: SqlStorage,
    U: UserStorage,
{
    type Rejection = SessionAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S, U>,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(MaybeAuth(None));
        }
        RequireAuth::from_request_parts(parts, state)
            .await
            .map(|auth| MaybeAuth(Some(auth)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token_valid() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer my-token-123".parse().unwrap());

        assert_eq!(extract_bearer_token(&headers), Some("my-token-123"));
    }

    #[test]
    fn test_extract_bearer_token_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_no_bearer_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Token my-token-123".parse().unwrap());

        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_extract_bearer_token_empty_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());

        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[test]
    fn test_session_auth_error_statuses() {
        assert_eq!(
            SessionAuthError::missing_token().into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            SessionAuthError::revoked_token().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            SessionAuthError::server_error().into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
