use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use super::error::ApiError;
use crate::database::SqlStorage;
use crate::shopping_list;
use crate::state::AppState;
use crate::users::{RequireAuth, UserStorage};

/// Plain-text shopping list for every recipe in the caller's cart.
///
/// GET /api/recipes/download_shopping_cart/
#[tracing::instrument(skip_all, fields(user_id = auth.user_id()))]
pub async fn download<S, U>(
    State(state): State<AppState<S, U>>,
    auth: RequireAuth,
) -> Result<Response, ApiError>
where
    S: SqlStorage,
    U: UserStorage,
{
    let items = state.sql_storage.shopping_list(auth.user_id()).await?;
    let body = shopping_list::render(&items);

    let disposition = format!("attachment; filename=\"{}\"", shopping_list::FILENAME);
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::Internal(format!("invalid content disposition: {e}")))?;

    Ok((
        StatusCode::OK,
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
