use crate::config::{Config, Env};
use crate::database::SqlStorage;
use crate::media::{MediaStore, content_type_for};
use crate::state::AppState;
use crate::users::UserStorage;
use axum::{
    Router,
    extract::{DefaultBodyLimit, Extension, Path, Request, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{any, get},
};
use opentelemetry::{global, propagation::Extractor};
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub mod api;
pub mod catalog_import;
pub mod config;
pub mod database;
pub mod media;
pub mod shopping_list;
pub mod state;
pub mod telemetry;
pub mod users;

pub const BUILD_DATE: &str = env!("BUILD_DATE");
pub const BUILD_COMMIT: &str = env!("BUILD_COMMIT");
pub const BUILD_BRANCH: &str = env!("BUILD_BRANCH");

/// Version string reported in `x-service-version`.
pub fn version_for(env: Env) -> String {
    match env {
        Env::Local | Env::Test => format!("main:{BUILD_COMMIT}"),
        Env::Prod => format!("stable:{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Base64 inflates by 4/3; leave room for the other JSON fields.
fn body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes / 3 * 4 + 64 * 1024
}

struct HeaderExtractor<'a>(&'a axum::http::HeaderMap);

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Builds the full router: health check, media files and the `/api` tree.
pub fn routes<S, U>(sql_storage: S, user_storage: U, media: MediaStore, config: Config) -> Router
where
    S: SqlStorage,
    U: UserStorage,
{
    let state = AppState::new(sql_storage, user_storage, media);
    let body_limit = body_limit(config.max_image_bytes());

    Router::new()
        .route("/is-health", get(health_check::<S, U>))
        .route("/media/{*key}", get(serve_media::<S, U>))
        .nest("/api", api::routes::<S, U>())
        .fallback(any(catch_all))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let parent_context = global::get_text_map_propagator(|propagator| {
                    propagator.extract(&HeaderExtractor(request.headers()))
                });

                let span = tracing::info_span!(
                    "http_request",
                    http_request.method = ?request.method(),
                    http_request.uri = ?request.uri(),
                    http_request.version = ?request.version(),
                    http_request.user_agent = ?request.headers().get(header::USER_AGENT),
                );
                span.set_parent(parent_context);

                span
            }),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(Extension(config))
        .with_state(state)
}

async fn health_check<S, U>(
    State(state): State<AppState<S, U>>,
    Extension(config): Extension<Config>,
) -> impl IntoResponse
where
    S: SqlStorage,
    U: UserStorage,
{
    let mut response = if state.sql_storage.is_connected().await {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::BAD_GATEWAY, "502").into_response()
    };

    let headers = [
        ("x-service-env", config.environment().to_string()),
        ("x-service-version", version_for(config.environment())),
    ];
    for (name, value) in headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(name), value);
        }
    }

    response
}

/// GET /media/{*key}
async fn serve_media<S, U>(
    State(state): State<AppState<S, U>>,
    Path(key): Path<String>,
) -> impl IntoResponse
where
    S: SqlStorage,
    U: UserStorage,
{
    if key.split('/').any(|segment| segment == "..") {
        return (StatusCode::NOT_FOUND, "nothing to see here").into_response();
    }

    match state.media.read(&key).await {
        Ok(Some(bytes)) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, content_type_for(&key))],
            bytes,
        )
            .into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "nothing to see here").into_response(),
        Err(e) => {
            tracing::error!("Failed to read media {key}: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn catch_all() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MockSqlStorage;
    use crate::users::MockUserStorage;
    use axum::body::Body;
    use tower::ServiceExt;

    fn app(sql_storage: MockSqlStorage) -> Router {
        let media = MediaStore::memory("/media/").expect("memory operator");
        routes(sql_storage, MockUserStorage::new(), media, Config::new_for_test())
    }

    #[tokio::test]
    async fn test_health_check_connected() {
        let response = app(MockSqlStorage::new())
            .oneshot(
                Request::builder()
                    .uri("/is-health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let version_header = response
            .headers()
            .get("x-service-version")
            .and_then(|v| v.to_str().ok());
        assert_eq!(version_header, Some(version_for(Env::Test).as_str()));
    }

    #[tokio::test]
    async fn test_health_check_disconnected() {
        let response = app(MockSqlStorage::disconnected())
            .oneshot(
                Request::builder()
                    .uri("/is-health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unknown_path_falls_through() {
        let response = app(MockSqlStorage::new())
            .oneshot(
                Request::builder()
                    .uri("/admin/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_missing_media_is_not_found() {
        let response = app(MockSqlStorage::new())
            .oneshot(
                Request::builder()
                    .uri("/media/recipes/images/nope.png")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_version_formats() {
        assert_eq!(version_for(Env::Local), format!("main:{BUILD_COMMIT}"));
        assert!(version_for(Env::Prod).starts_with("stable:"));
    }

    #[test]
    fn test_body_limit_fits_a_max_size_image() {
        let limit = body_limit(5 * 1024 * 1024);
        assert!(limit > 5 * 1024 * 1024 * 4 / 3);
    }
}
