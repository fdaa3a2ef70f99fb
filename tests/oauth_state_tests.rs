// SPDX-License-Identifier: MIT

//! Catalog OAuth callback tests: tampered or missing state must never
//! reach the token exchange.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

#[tokio::test]
async fn test_callback_with_garbage_state_redirects_with_error() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/catalog/callback?code=abc&state=garbage")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(location, "http://localhost:3000/callback?error=invalid_state");
}

#[tokio::test]
async fn test_callback_passes_provider_error_through() {
    use tonemint::routes::auth::sign_state;

    let (app, state) = common::create_test_app();
    let signed = sign_state("user-1", "http://localhost:3000", &state.config.oauth_state_key)
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!(
                    "/auth/catalog/callback?error=access_denied&state={signed}"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert_eq!(
        location,
        "http://localhost:3000/callback?error=access_denied"
    );
}

#[tokio::test]
async fn test_callback_without_code_is_bad_request() {
    use tonemint::routes::auth::sign_state;

    let (app, state) = common::create_test_app();
    let signed = sign_state("user-1", "http://localhost:3000", &state.config.oauth_state_key)
        .unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(format!("/auth/catalog/callback?state={signed}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
