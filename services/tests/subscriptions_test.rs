mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn test_subscribe_returns_author_with_recipes() {
    let app = TestApp::new();
    let (_, reader) = app.user("reader").await;
    let (author, author_token) = app.user("author").await;
    for name in ["Soup", "Salad", "Stew"] {
        app.create_recipe(&author_token, name, &[(4, 100)], &[2]).await;
    }

    let response = app
        .post_empty(
            &format!("/api/users/{}/subscribe/?recipes_limit=2", author.id),
            Some(&reader),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.text());

    let body = response.json();
    assert_eq!(body["id"], author.id);
    assert_eq!(body["username"], "author");
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["recipes_count"], 3);
    let recipes = body["recipes"].as_array().unwrap();
    assert_eq!(recipes.len(), 2);
    assert_eq!(recipes[0]["name"], "Stew");

    let profile = app
        .get(&format!("/api/users/{}/", author.id), Some(&reader))
        .await
        .json();
    assert_eq!(profile["is_subscribed"], true);
}

#[tokio::test]
async fn test_duplicate_and_missing_subscriptions_are_rejected() {
    let app = TestApp::new();
    let (_, reader) = app.user("reader").await;
    let (author, _) = app.user("author").await;
    let uri = format!("/api/users/{}/subscribe/", author.id);

    assert_eq!(app.post_empty(&uri, Some(&reader)).await.status, StatusCode::CREATED);
    assert_eq!(app.post_empty(&uri, Some(&reader)).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.users.subscription_count(), 1);

    assert_eq!(app.delete(&uri, Some(&reader)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&uri, Some(&reader)).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.users.subscription_count(), 0);

    let missing = app.post_empty("/api/users/999/subscribe/", Some(&reader)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_self_subscription_is_always_rejected() {
    let app = TestApp::new();
    let (me, token) = app.user("narcissus").await;
    let uri = format!("/api/users/{}/subscribe/", me.id);

    for _ in 0..2 {
        let response = app.post_empty(&uri, Some(&token)).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }
    assert_eq!(app.users.subscription_count(), 0);
}

#[tokio::test]
async fn test_subscriptions_list_is_paginated() {
    let app = TestApp::new();
    let (_, reader) = app.user("reader").await;
    for name in ["carol", "alice", "bob"] {
        let (author, token) = app.user(name).await;
        app.create_recipe(&token, "Toast", &[(1, 50)], &[1]).await;
        app.post_empty(&format!("/api/users/{}/subscribe/", author.id), Some(&reader))
            .await;
    }

    let response = app
        .get("/api/users/subscriptions/?limit=2&recipes_limit=0", Some(&reader))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["count"], 3);
    assert_eq!(body["next"], "/api/users/subscriptions/?limit=2&recipes_limit=0&page=2");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["username"], "alice");
    assert_eq!(results[1]["username"], "bob");
    assert_eq!(results[0]["recipes_count"], 1);
    assert!(results[0]["recipes"].as_array().unwrap().is_empty());

    let anonymous = app.get("/api/users/subscriptions/", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}
