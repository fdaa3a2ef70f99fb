// SPDX-License-Identifier: MIT

//! Request validation tests. All of these must fail before any network
//! or database access, so they run against the offline mock.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use tonemint::middleware::auth::create_jwt;
use tonemint::models::UserRole;

mod common;

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_json_authed(uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_register_rejects_invalid_email() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/auth/register",
            json!({
                "name": "Jane",
                "email": "not-an-email",
                "password": "secret123",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_register_rejects_empty_name() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/auth/register",
            json!({
                "name": "",
                "email": "jane@example.com",
                "password": "secret123",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(post_json(
            "/auth/register",
            json!({
                "name": "Jane",
                "email": "jane@example.com",
                "password": "short",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_search_requires_query() {
    let (app, state) = common::create_test_app();
    let token = create_jwt("user-1", UserRole::User, &state.config.jwt_signing_key).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/catalog/search?q=%20")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_recommendations_require_a_seed() {
    let (app, state) = common::create_test_app();
    let token = create_jwt("user-1", UserRole::User, &state.config.jwt_signing_key).unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/catalog/recommendations")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_favorite_requires_track_id() {
    let (app, state) = common::create_test_app();
    let token = create_jwt("user-1", UserRole::User, &state.config.jwt_signing_key).unwrap();

    let response = app
        .oneshot(post_json_authed(
            "/api/favorites",
            &token,
            json!({ "track_id": "", "name": "Song" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_playlist_requires_name() {
    let (app, state) = common::create_test_app();
    let token = create_jwt("user-1", UserRole::User, &state.config.jwt_signing_key).unwrap();

    let response = app
        .oneshot(post_json_authed(
            "/api/playlists",
            &token,
            json!({ "name": "" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_purchase_rejects_non_positive_price() {
    let (app, state) = common::create_test_app();
    let token = create_jwt("user-1", UserRole::User, &state.config.jwt_signing_key).unwrap();

    for price in [0.0, -1.0] {
        let response = app
            .clone()
            .oneshot(post_json_authed(
                "/api/market/purchases",
                &token,
                json!({ "item_type": "music", "item_id": "t1", "price": price }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
