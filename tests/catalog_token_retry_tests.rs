// SPDX-License-Identifier: MIT

//! Rejected-token handling against a local catalog stub.
//!
//! The stub plays both the token endpoint and the API endpoints so each
//! test can count exactly how many exchanges and API calls a code path
//! makes. Tokens are issued as `token-<n>`; API routes reject every token
//! issued before a configurable sequence number with a 401.

mod common;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tonemint::db::FirestoreDb;
use tonemint::models::StoredCatalogTokens;
use tonemint::services::{CatalogClient, CatalogService, HomeFeedCache, TokenManager};

#[derive(Clone)]
struct CatalogStub {
    token_exchanges: Arc<AtomicUsize>,
    api_calls: Arc<AtomicUsize>,
    /// API calls presenting a token issued before this sequence number
    /// get a 401.
    reject_below: usize,
}

fn catalog_stub(reject_below: usize) -> (Router, CatalogStub) {
    let stub = CatalogStub {
        token_exchanges: Arc::new(AtomicUsize::new(0)),
        api_calls: Arc::new(AtomicUsize::new(0)),
        reject_below,
    };

    let router = Router::new()
        .route("/api/token", post(token_endpoint))
        .route("/search", get(search_endpoint))
        .route("/me", get(me_endpoint))
        .route("/browse/new-releases", get(new_releases_endpoint))
        .with_state(stub.clone());

    (router, stub)
}

async fn token_endpoint(State(stub): State<CatalogStub>) -> Json<serde_json::Value> {
    let n = stub.token_exchanges.fetch_add(1, Ordering::SeqCst) + 1;
    Json(serde_json::json!({
        "access_token": format!("token-{}", n),
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": format!("refresh-{}", n),
    }))
}

fn bearer_sequence(headers: &HeaderMap) -> usize {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer token-"))
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

fn rejected() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": {"status": 401, "message": "The access token expired"}
        })),
    )
        .into_response()
}

async fn search_endpoint(State(stub): State<CatalogStub>, headers: HeaderMap) -> Response {
    stub.api_calls.fetch_add(1, Ordering::SeqCst);
    if bearer_sequence(&headers) < stub.reject_below {
        return rejected();
    }
    Json(serde_json::json!({
        "tracks": {"items": [{"id": "6", "name": "Excuses"}], "total": 1}
    }))
    .into_response()
}

async fn me_endpoint(State(stub): State<CatalogStub>, headers: HeaderMap) -> Response {
    stub.api_calls.fetch_add(1, Ordering::SeqCst);
    if bearer_sequence(&headers) < stub.reject_below {
        return rejected();
    }
    Json(serde_json::json!({
        "id": "catalog-jane",
        "display_name": "Jane"
    }))
    .into_response()
}

async fn new_releases_endpoint(State(stub): State<CatalogStub>) -> Response {
    stub.api_calls.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "upstream down"})),
    )
        .into_response()
}

fn stub_client(base: &str) -> CatalogClient {
    CatalogClient::new(
        "cid".to_string(),
        "secret".to_string(),
        "http://localhost:8080/auth/catalog/callback".to_string(),
    )
    .with_base_urls(base.to_string(), base.to_string())
}

fn offline_service(base: &str) -> CatalogService {
    let client = stub_client(base);
    let tokens = TokenManager::new(client.clone(), FirestoreDb::new_mock());
    CatalogService::from_parts(client, tokens)
}

#[tokio::test]
async fn rejected_app_token_is_refreshed_and_retried_once() {
    // token-1 gets a 401, the exchange after the forced refresh succeeds
    let (router, stub) = catalog_stub(2);
    let base = common::spawn_stub(router).await;
    let service = offline_service(&base);

    let results = service.search("excuses", "track", None).await.unwrap();

    let tracks = results.tracks.expect("search returned no track section");
    assert_eq!(tracks.items.len(), 1);
    assert_eq!(tracks.items[0].id, "6");

    assert_eq!(stub.token_exchanges.load(Ordering::SeqCst), 2);
    assert_eq!(stub.api_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn persistent_rejection_surfaces_after_exactly_one_retry() {
    let (router, stub) = catalog_stub(usize::MAX);
    let base = common::spawn_stub(router).await;
    let service = offline_service(&base);

    let err = service.search("excuses", "track", None).await.unwrap_err();
    assert!(err.is_catalog_token_error());

    // one refresh, one retry, then the error surfaces
    assert_eq!(stub.token_exchanges.load(Ordering::SeqCst), 2);
    assert_eq!(stub.api_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn valid_app_token_is_reused_across_calls() {
    let (router, stub) = catalog_stub(0);
    let base = common::spawn_stub(router).await;
    let service = offline_service(&base);

    service.search("excuses", "track", None).await.unwrap();
    service.search("winter", "track", None).await.unwrap();

    assert_eq!(stub.token_exchanges.load(Ordering::SeqCst), 1);
    assert_eq!(stub.api_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failed_home_feed_refresh_is_retried_on_next_request() {
    let (router, stub) = catalog_stub(0);
    let base = common::spawn_stub(router).await;
    let service = offline_service(&base);
    let cache = HomeFeedCache::default();

    let first = cache.snapshot_and_refresh(service.clone());
    assert!(first.data.is_none());

    // The first fetch fails with a 500. A later request must kick a new
    // fetch instead of serving the error until the freshness window ends.
    let mut saw_error = false;
    for _ in 0..100 {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let state = cache.snapshot_and_refresh(service.clone());
        saw_error |= state.error.is_some();
        if saw_error && stub.api_calls.load(Ordering::SeqCst) >= 2 {
            return;
        }
    }
    panic!("home feed refresh was not retried after a failed fetch");
}

#[tokio::test]
async fn rejected_user_token_refreshes_from_stored_refresh_token() {
    require_emulator!();
    let db = common::test_db().await;
    let uid = format!("retry-user-{}", uuid::Uuid::new_v4());

    // Stored access token looks valid by expiry but the API rejects it.
    let seeded = StoredCatalogTokens {
        access_token: "token-0".to_string(),
        refresh_token: "refresh-0".to_string(),
        expires_at: (chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339(),
    };
    db.set_catalog_tokens(&uid, &seeded).await.unwrap();

    let (router, stub) = catalog_stub(1);
    let base = common::spawn_stub(router).await;
    let client = stub_client(&base);
    let tokens = TokenManager::new(client.clone(), db.clone());
    let service = CatalogService::from_parts(client, tokens);

    let profile = service.profile(&uid).await.unwrap();
    assert_eq!(profile.id, "catalog-jane");

    // one 401, one refresh exchange, one successful retry
    assert_eq!(stub.token_exchanges.load(Ordering::SeqCst), 1);
    assert_eq!(stub.api_calls.load(Ordering::SeqCst), 2);

    // The rotated refresh token was persisted.
    let stored = db.get_catalog_tokens(&uid).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "token-1");
    assert_eq!(stored.refresh_token, "refresh-1");
}
