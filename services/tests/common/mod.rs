//! Shared test utilities for integration tests.
//!
//! `TestApp` wires the real router to the in-memory storages with a small
//! catalog already loaded:
//!
//! - tags 1..=3: breakfast, lunch, dinner
//! - ingredients 1..=4: flour (g), sugar (g), egg (pcs), milk (ml)

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use foodgram_services::{
    config::Config,
    database::MockSqlStorage,
    media::MediaStore,
    routes,
    users::{
        MockUserStorage, NewUser, StoredUser, UserStorage, password::hash_password,
        token::issue_session_token,
    },
};
use serde_json::{Value, json};
use tower::ServiceExt;

/// A 1x1 PNG.
pub const PNG_BASE64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

pub const TEST_PASSWORD: &str = "s3cure-pass";

pub fn png_data_url() -> String {
    format!("data:image/png;base64,{PNG_BASE64}")
}

/// A response split into what tests look at.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).expect("response body is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.bytes.clone()).expect("response body is UTF-8")
    }
}

pub struct TestApp {
    pub router: Router,
    pub config: Config,
    pub sql: MockSqlStorage,
    pub users: MockUserStorage,
    pub media: MediaStore,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::new_for_test())
    }

    pub fn with_config(config: Config) -> Self {
        let sql = MockSqlStorage::new()
            .with_tags([
                ("Breakfast", "#E26C2D", "breakfast"),
                ("Lunch", "#49B64E", "lunch"),
                ("Dinner", "#8775D2", "dinner"),
            ])
            .with_ingredients([
                ("flour", "g"),
                ("sugar", "g"),
                ("egg", "pcs"),
                ("milk", "ml"),
            ]);
        let users = MockUserStorage::new();
        let media = MediaStore::memory(config.media_url()).expect("memory operator");
        let router = routes(sql.clone(), users.clone(), media.clone(), config.clone());

        Self {
            router,
            config,
            sql,
            users,
            media,
        }
    }

    /// Creates an account directly in storage and returns it with a fresh token.
    pub async fn user(&self, username: &str) -> (StoredUser, String) {
        let user = self
            .users
            .create_user(NewUser {
                email: format!("{username}@example.com"),
                username: username.to_owned(),
                first_name: "Test".to_owned(),
                last_name: username.to_owned(),
                password_hash: hash_password(TEST_PASSWORD).expect("hash password"),
            })
            .await
            .expect("create user");
        let token = issue_session_token(user.id, self.config.jwt_secret(), self.config.token_ttl())
            .expect("issue token");
        (user, token)
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body")
            .to_vec();
        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::POST, uri, token, None).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Creates a recipe through the API and returns its id.
    pub async fn create_recipe(
        &self,
        token: &str,
        name: &str,
        ingredients: &[(i64, i64)],
        tags: &[i64],
    ) -> i64 {
        let response = self
            .post("/api/recipes/", Some(token), recipe_body(name, ingredients, tags))
            .await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "create recipe failed: {}",
            response.text()
        );
        response.json()["id"].as_i64().expect("recipe id")
    }
}

pub fn recipe_body(name: &str, ingredients: &[(i64, i64)], tags: &[i64]) -> Value {
    let ingredients: Vec<Value> = ingredients
        .iter()
        .map(|(id, amount)| json!({ "id": id, "amount": amount }))
        .collect();
    json!({
        "name": name,
        "text": "Mix everything and bake.",
        "cooking_time": 30,
        "image": png_data_url(),
        "ingredients": ingredients,
        "tags": tags,
    })
}
