//! The public JSON API mounted under `/api`.

use axum::{
    Router,
    routing::{get, post},
};

use crate::database::SqlStorage;
use crate::state::AppState;
use crate::users::{self, UserStorage};

pub mod error;
pub mod ingredients;
pub mod pagination;
pub mod present;
pub mod recipe_payload;
pub mod recipes;
pub mod shopping_cart;
pub mod social;
pub mod subscriptions;
pub mod tags;
pub mod types;

pub use error::{ApiError, ApiErrorResponse, FieldErrors};

/// All `/api` routes. Fixed segments such as `/recipes/download_shopping_cart/`
/// take precedence over the `{id}` captures next to them.
pub fn routes<S, U>() -> Router<AppState<S, U>>
where
    S: SqlStorage,
    U: UserStorage,
{
    Router::new()
        .route("/tags/", get(tags::list::<S, U>))
        .route("/tags/{id}/", get(tags::get::<S, U>))
        .route("/ingredients/", get(ingredients::list::<S, U>))
        .route("/ingredients/{id}/", get(ingredients::get::<S, U>))
        .route(
            "/recipes/",
            get(recipes::list::<S, U>).post(recipes::create::<S, U>),
        )
        .route(
            "/recipes/download_shopping_cart/",
            get(shopping_cart::download::<S, U>),
        )
        .route(
            "/recipes/{id}/",
            get(recipes::get::<S, U>)
                .patch(recipes::update::<S, U>)
                .delete(recipes::delete::<S, U>),
        )
        .route(
            "/recipes/{id}/favorite/",
            post(social::favorite_add::<S, U>).delete(social::favorite_remove::<S, U>),
        )
        .route(
            "/recipes/{id}/shopping_cart/",
            post(social::cart_add::<S, U>).delete(social::cart_remove::<S, U>),
        )
        .route(
            "/users/subscriptions/",
            get(subscriptions::list::<S, U>),
        )
        .route(
            "/users/{id}/subscribe/",
            post(subscriptions::subscribe::<S, U>).delete(subscriptions::unsubscribe::<S, U>),
        )
        .merge(users::routes::routes::<S, U>())
}
