//! HTTP routes for accounts and session tokens.
//!
//! Mounted under `/api` next to the recipe routes:
//!
//! - `POST /users/` register, `GET /users/` paginated directory
//! - `GET /users/{id}/`, `GET /users/me/`
//! - `POST /users/set_password/`
//! - `POST /auth/token/login/`, `POST /auth/token/logout/`

use axum::{
    Extension, Json, Router,
    extract::{OriginalUri, Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use axum_extra::extract::{Query, QueryRejection};
use serde::{Deserialize, Serialize};

use super::password::{hash_password, password_problems, verify_password};
use super::session_auth::{MaybeAuth, RequireAuth};
use super::storage::{NewUser, StoredUser, UserStorage, UserStorageError};
use super::token::issue_session_token;
use crate::api::error::{ApiError, FieldErrors};
use crate::api::pagination::{PageRequest, Paginated};
use crate::api::present::user_item;
use crate::api::types::UserItem;
use crate::config::Config;
use crate::database::SqlStorage;
use crate::state::AppState;

pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_NAME_LEN: usize = 150;

/// Usernames that would shadow a fixed route.
const RESERVED_USERNAMES: &[&str] = &["me"];

const BAD_CREDENTIALS: &str = "Unable to log in with provided credentials.";

/// Account and token routes, with paths relative to `/api`.
pub fn routes<S, U>() -> Router<AppState<S, U>>
where
    S: SqlStorage,
    U: UserStorage,
{
    Router::new()
        .route("/users/", post(register::<S, U>).get(list::<S, U>))
        .route("/users/me/", get(me::<S, U>))
        .route("/users/set_password/", post(set_password::<S, U>))
        .route("/users/{id}/", get(retrieve::<S, U>))
        .route("/auth/token/login/", post(login::<S, U>))
        .route("/auth/token/logout/", post(logout::<S, U>))
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
}

/// Returned by registration; carries no subscription state.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisteredUser {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<StoredUser> for RegisteredUser {
    fn from(user: StoredUser) -> Self {
        Self {
            email: user.email,
            id: user.id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub auth_token: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UsersQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

fn is_valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'))
}

/// Trims a required text field and records what is wrong with it.
fn required_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    max_len: usize,
) -> String {
    let value = value.map(|v| v.trim().to_owned()).unwrap_or_default();
    if value.is_empty() {
        errors.add(field, "This field is required.");
    } else if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this field has no more than {max_len} characters."),
        );
    }
    value
}

fn validate_registration(payload: RegisterRequest, errors: &mut FieldErrors) -> NewUser {
    let email = required_text(errors, "email", payload.email, MAX_EMAIL_LEN).to_lowercase();
    if !email.is_empty() && !errors.has("email") && !is_valid_email(&email) {
        errors.add("email", "Enter a valid email address.");
    }

    let username = required_text(errors, "username", payload.username, MAX_NAME_LEN);
    if !username.is_empty() && !errors.has("username") {
        if !is_valid_username(&username) {
            errors.add(
                "username",
                "Enter a valid username. Only letters, digits and @/./+/-/_ are allowed.",
            );
        } else if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
            errors.add("username", format!("The username \"{username}\" is reserved."));
        }
    }

    let first_name = required_text(errors, "first_name", payload.first_name, MAX_NAME_LEN);
    let last_name = required_text(errors, "last_name", payload.last_name, MAX_NAME_LEN);

    let password = payload.password.unwrap_or_default();
    if password.is_empty() {
        errors.add("password", "This field is required.");
    } else {
        for problem in password_problems(&password) {
            errors.add("password", problem);
        }
    }

    NewUser {
        email,
        username,
        first_name,
        last_name,
        // Hashed by the caller once validation passes.
        password_hash: password,
    }
}

/// Register a new account.
///
/// POST /api/users/
#[tracing::instrument(skip_all)]
async fn register<S, U>(
    State(state): State<AppState<S, U>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredUser>), ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let Json(payload) = payload?;
    let mut errors = FieldErrors::new();
    let mut input = validate_registration(payload, &mut errors);

    if !errors.has("email")
        && state
            .user_storage
            .get_user_by_email(&input.email)
            .await?
            .is_some()
    {
        errors.add("email", "A user with that email already exists.");
    }
    if !errors.has("username")
        && state
            .user_storage
            .get_user_by_username(&input.username)
            .await?
            .is_some()
    {
        errors.add("username", "A user with that username already exists.");
    }
    errors.into_result()?;

    input.password_hash =
        hash_password(&input.password_hash).map_err(|e| ApiError::Internal(e.to_string()))?;

    match state.user_storage.create_user(input).await {
        Ok(user) => {
            tracing::info!(user_id = user.id, "User registered");
            Ok((StatusCode::CREATED, Json(RegisteredUser::from(user))))
        }
        // Lost a race against a concurrent registration.
        Err(UserStorageError::UserAlreadyExists(field)) => {
            let mut errors = FieldErrors::new();
            errors.add(&field, format!("A user with that {field} already exists."));
            Err(ApiError::Validation(errors))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /api/users/
#[tracing::instrument(skip_all)]
async fn list<S, U>(
    State(state): State<AppState<S, U>>,
    Extension(config): Extension<Config>,
    OriginalUri(uri): OriginalUri,
    auth: MaybeAuth,
    query: Result<Query<UsersQuery>, QueryRejection>,
) -> Result<Json<Paginated<UserItem>>, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let Query(query) = query?;
    let page = PageRequest::new(query.page, query.limit, config.page_size())?;
    let found = state
        .user_storage
        .list_users(page.limit(), page.offset())
        .await?;

    let mut results = Vec::with_capacity(found.items.len());
    for user in &found.items {
        results.push(user_item(&state, auth.user_id(), user).await?);
    }
    Ok(Json(Paginated::new(results, found.total, page, &uri)))
}

/// GET /api/users/{id}/
async fn retrieve<S, U>(
    State(state): State<AppState<S, U>>,
    auth: MaybeAuth,
    Path(id): Path<i64>,
) -> Result<Json<UserItem>, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let user = state
        .user_storage
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))?;
    Ok(Json(user_item(&state, auth.user_id(), &user).await?))
}

/// GET /api/users/me/
async fn me<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
) -> Result<Json<UserItem>, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    Ok(Json(user_item(&state, Some(auth.user_id()), auth.user()).await?))
}

/// POST /api/users/set_password/
#[tracing::instrument(skip_all, fields(user_id = auth.user_id()))]
async fn set_password<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
    payload: Result<Json<SetPasswordRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let Json(payload) = payload?;
    let mut errors = FieldErrors::new();

    if !verify_password(&payload.current_password, &auth.user().password_hash) {
        tracing::warn!("Rejected password change with wrong current password");
        errors.add("current_password", "Invalid password.");
    }
    for problem in password_problems(&payload.new_password) {
        errors.add("new_password", problem);
    }
    errors.into_result()?;

    let hash =
        hash_password(&payload.new_password).map_err(|e| ApiError::Internal(e.to_string()))?;
    state
        .user_storage
        .set_password_hash(auth.user_id(), &hash)
        .await?;

    tracing::info!("Password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// Exchange email and password for a session token.
///
/// POST /api/auth/token/login/
#[tracing::instrument(skip_all)]
async fn login<S, U>(
    State(state): State<AppState<S, U>>,
    Extension(config): Extension<Config>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let Json(payload) = payload?;
    let email = payload.email.trim().to_lowercase();

    let user = match state.user_storage.get_user_by_email(&email).await? {
        Some(user) if verify_password(&payload.password, &user.password_hash) => user,
        _ => {
            tracing::warn!("Rejected login with bad credentials");
            return Err(ApiError::BadRequest(BAD_CREDENTIALS.to_owned()));
        }
    };

    let auth_token = issue_session_token(user.id, config.jwt_secret(), config.token_ttl())
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(user_id = user.id, "Session token issued");
    Ok(Json(LoginResponse { auth_token }))
}

/// Revoke the presented token.
///
/// POST /api/auth/token/logout/
#[tracing::instrument(skip_all, fields(user_id = auth.user_id()))]
async fn logout<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
) -> Result<StatusCode, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    state
        .user_storage
        .revoke_token(auth.token_hash(), auth.expires_at())
        .await?;
    state.revocation_cache.add_revoked(auth.token_hash());

    tracing::info!("Session token revoked");
    Ok(StatusCode::NO_CONTENT)
}
