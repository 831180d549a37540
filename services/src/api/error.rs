//! Error responses shared by every `/api` handler.

use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::database::SqlStorageError;
use crate::media::MediaError;
use crate::users::UserStorageError;

/// Body of every JSON error response.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

/// Per-field validation messages, collected before anything is written.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `Ok(())` when nothing was collected.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{what} not found"))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(message) => ApiErrorResponse {
                error: "bad_request".to_owned(),
                message,
                fields: None,
            },
            ApiError::Validation(FieldErrors(fields)) => {
                tracing::debug!(?fields, "Rejected invalid input");
                ApiErrorResponse {
                    error: "bad_request".to_owned(),
                    message: "Validation failed".to_owned(),
                    fields: Some(fields),
                }
            }
            ApiError::NotFound(message) => ApiErrorResponse {
                error: "not_found".to_owned(),
                message,
                fields: None,
            },
            ApiError::Forbidden(message) => ApiErrorResponse {
                error: "forbidden".to_owned(),
                message,
                fields: None,
            },
            ApiError::Internal(detail) => {
                tracing::error!("{detail}");
                ApiErrorResponse {
                    error: "internal_error".to_owned(),
                    message: "Internal server error".to_owned(),
                    fields: None,
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<SqlStorageError> for ApiError {
    fn from(err: SqlStorageError) -> Self {
        match err {
            SqlStorageError::Conflict(constraint) => {
                tracing::warn!(%constraint, "Uniqueness violation");
                ApiError::BadRequest("The object already exists".to_owned())
            }
            SqlStorageError::Db(message) => ApiError::Internal(format!("Database error: {message}")),
        }
    }
}

impl From<UserStorageError> for ApiError {
    fn from(err: UserStorageError) -> Self {
        match err {
            UserStorageError::UserAlreadyExists(field) => {
                ApiError::BadRequest(format!("A user with that {field} already exists"))
            }
            UserStorageError::UserNotFound(_) => ApiError::not_found("User"),
            UserStorageError::AlreadySubscribed => {
                ApiError::BadRequest("You are already subscribed to this author".to_owned())
            }
            UserStorageError::StorageError(message) => {
                ApiError::Internal(format!("User storage error: {message}"))
            }
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<axum_extra::extract::QueryRejection> for ApiError {
    fn from(rejection: axum_extra::extract::QueryRejection) -> Self {
        ApiError::BadRequest(rejection.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_errors_list_fields() {
        let mut errors = FieldErrors::new();
        errors.add("cooking_time", "Ensure this value is less than or equal to 500.");
        errors.add("tags", "This list may not be empty.");

        let response = errors.into_result().unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "bad_request");
        assert_eq!(json["fields"]["tags"][0], "This list may not be empty.");
        assert!(json["fields"]["cooking_time"].is_array());
    }

    #[tokio::test]
    async fn internal_errors_hide_details() {
        let response = ApiError::from(SqlStorageError::Db("connection reset".to_owned()))
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["message"], "Internal server error");
        assert!(json.get("fields").is_none());
    }

    #[test]
    fn conflicts_are_client_errors() {
        let err = ApiError::from(SqlStorageError::Conflict("fav_user_recipe".to_owned()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(UserStorageError::AlreadySubscribed).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn empty_field_errors_pass() {
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
