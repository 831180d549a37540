//! Favorites, shopping cart and the shopping-list export.

mod common;

use axum::http::StatusCode;
use common::TestApp;
use foodgram_services::database::RecipeRelation;

#[tokio::test]
async fn test_favorite_twice_then_remove_twice() {
    let app = TestApp::new();
    let (_, token) = app.user("chef").await;
    let id = app.create_recipe(&token, "Pie", &[(1, 300)], &[3]).await;
    let uri = format!("/api/recipes/{id}/favorite/");

    let added = app.post_empty(&uri, Some(&token)).await;
    assert_eq!(added.status, StatusCode::CREATED);
    let body = added.json();
    assert_eq!(body["id"], id);
    assert_eq!(body["name"], "Pie");
    assert_eq!(body["cooking_time"], 30);
    assert!(body["image"].as_str().unwrap().starts_with("/media/"));

    let again = app.post_empty(&uri, Some(&token)).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.sql.relation_count(RecipeRelation::Favorite), 1);

    assert_eq!(app.delete(&uri, Some(&token)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&uri, Some(&token)).await.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.sql.relation_count(RecipeRelation::Favorite), 0);
}

#[tokio::test]
async fn test_cart_toggle_is_independent_of_favorites() {
    let app = TestApp::new();
    let (_, token) = app.user("chef").await;
    let id = app.create_recipe(&token, "Pie", &[(1, 300)], &[3]).await;

    let cart = format!("/api/recipes/{id}/shopping_cart/");
    assert_eq!(app.post_empty(&cart, Some(&token)).await.status, StatusCode::CREATED);

    let recipe = app
        .get(&format!("/api/recipes/{id}/"), Some(&token))
        .await
        .json();
    assert_eq!(recipe["is_in_shopping_cart"], true);
    assert_eq!(recipe["is_favorited"], false);

    assert_eq!(app.delete(&cart, Some(&token)).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.sql.relation_count(RecipeRelation::Cart), 0);
}

#[tokio::test]
async fn test_toggles_need_token_and_recipe() {
    let app = TestApp::new();
    let (_, token) = app.user("chef").await;
    let id = app.create_recipe(&token, "Pie", &[(1, 300)], &[3]).await;

    let response = app
        .post_empty(&format!("/api/recipes/{id}/favorite/"), None)
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app
        .post_empty("/api/recipes/999/shopping_cart/", Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.delete("/api/recipes/999/favorite/", Some(&token)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_a_recipe_clears_its_relations() {
    let app = TestApp::new();
    let (_, token) = app.user("chef").await;
    let id = app.create_recipe(&token, "Pie", &[(1, 300)], &[3]).await;
    app.post_empty(&format!("/api/recipes/{id}/favorite/"), Some(&token))
        .await;
    app.post_empty(&format!("/api/recipes/{id}/shopping_cart/"), Some(&token))
        .await;

    app.delete(&format!("/api/recipes/{id}/"), Some(&token)).await;
    assert_eq!(app.sql.relation_count(RecipeRelation::Favorite), 0);
    assert_eq!(app.sql.relation_count(RecipeRelation::Cart), 0);
}

#[tokio::test]
async fn test_shopping_list_sums_amounts_across_recipes() {
    let app = TestApp::new();
    let (_, ann) = app.user("ann").await;
    let (_, bob) = app.user("bob").await;
    let pancakes = app
        .create_recipe(&ann, "Pancakes", &[(1, 200), (4, 300), (3, 2)], &[1])
        .await;
    let bread = app.create_recipe(&bob, "Bread", &[(1, 500)], &[2]).await;
    let cookies = app.create_recipe(&bob, "Cookies", &[(2, 100)], &[2]).await;

    for id in [pancakes, bread] {
        app.post_empty(&format!("/api/recipes/{id}/shopping_cart/"), Some(&ann))
            .await;
    }
    // Someone else's cart does not leak in.
    app.post_empty(&format!("/api/recipes/{cookies}/shopping_cart/"), Some(&bob))
        .await;

    let response = app
        .get("/api/recipes/download_shopping_cart/", Some(&ann))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers["content-type"],
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        response.headers["content-disposition"],
        "attachment; filename=\"shopping_list.txt\""
    );
    assert_eq!(
        response.text(),
        "Shopping list\n\negg (pcs) - 2\nflour (g) - 700\nmilk (ml) - 300\n\nHappy cooking!\n"
    );
}

#[tokio::test]
async fn test_empty_cart_exports_an_empty_list() {
    let app = TestApp::new();
    let (_, token) = app.user("chef").await;

    let response = app
        .get("/api/recipes/download_shopping_cart/", Some(&token))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "Shopping list\n\n\nHappy cooking!\n");
}

#[tokio::test]
async fn test_export_requires_token() {
    let app = TestApp::new();
    let response = app.get("/api/recipes/download_shopping_cart/", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
