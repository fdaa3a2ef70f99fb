// SPDX-License-Identifier: MIT

//! User-document mirroring against a local identity provider stub.
//!
//! Sign-in is played by a stub serving the Identity Toolkit REST surface,
//! so the tests can assert exactly what lands in the mirrored Firestore
//! document: first login creates it with default role `user` and the
//! provider's profile, while a registered account keeps its chosen role
//! across later logins.

mod common;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tonemint::config::Config;
use tonemint::models::UserRole;
use tonemint::services::{IdentityClient, SessionService};

#[derive(Clone)]
struct IdentityStub {
    uid: String,
}

fn identity_stub(uid: &str) -> Router {
    let stub = IdentityStub {
        uid: uid.to_string(),
    };

    Router::new()
        .route("/accounts:signInWithPassword", post(sign_in_password))
        .route("/accounts:signUp", post(sign_up))
        .route("/accounts:update", post(update_profile))
        .with_state(stub)
}

async fn sign_in_password(State(stub): State<IdentityStub>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "localId": stub.uid,
        "email": "jane@example.com",
        "displayName": "Jane Doe",
        "photoUrl": "https://img.example/jane.png",
        "idToken": "provider-session-token",
    }))
}

async fn sign_up(State(stub): State<IdentityStub>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "localId": stub.uid,
        "email": "jane@example.com",
        "idToken": "fresh-account-token",
    }))
}

async fn update_profile() -> Json<serde_json::Value> {
    Json(serde_json::json!({}))
}

async fn stub_sessions(uid: &str) -> (SessionService, tonemint::db::FirestoreDb) {
    let config = Config::test_default();
    let db = common::test_db().await;
    let base = common::spawn_stub(identity_stub(uid)).await;

    let identity = IdentityClient::new(config.identity_api_key.clone()).with_base_url(base);
    let sessions = SessionService::new(identity, db.clone(), config.jwt_signing_key);
    (sessions, db)
}

#[tokio::test]
async fn first_login_mirrors_provider_profile_with_default_role() {
    require_emulator!();
    let uid = format!("mirror-{}", uuid::Uuid::new_v4());
    let (sessions, db) = stub_sessions(&uid).await;

    let session = sessions.login("jane@example.com", "secret123").await.unwrap();

    assert_eq!(session.user.uid, uid);
    assert_eq!(session.user.name, "Jane Doe");
    assert_eq!(session.user.role, UserRole::User);
    assert_eq!(
        session.user.profile_image.as_deref(),
        Some("https://img.example/jane.png")
    );
    assert!(!session.token.is_empty());

    let mirrored = db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(mirrored.name, "Jane Doe");
    assert_eq!(mirrored.role, UserRole::User);
    assert_eq!(mirrored.email, "jane@example.com");
}

#[tokio::test]
async fn register_then_login_keeps_chosen_role_and_name() {
    require_emulator!();
    let uid = format!("mirror-artist-{}", uuid::Uuid::new_v4());
    let (sessions, db) = stub_sessions(&uid).await;

    let registered = sessions
        .register("Jane", "jane@example.com", "secret123", UserRole::Artist)
        .await
        .unwrap();
    assert_eq!(registered.user.uid, uid);
    assert_eq!(registered.user.role, UserRole::Artist);

    // The later login reports "Jane Doe" as display name; the existing
    // document wins over the provider profile.
    let logged_in = sessions.login("jane@example.com", "secret123").await.unwrap();
    assert_eq!(logged_in.user.uid, uid);
    assert_eq!(logged_in.user.name, "Jane");
    assert_eq!(logged_in.user.role, UserRole::Artist);

    let mirrored = db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(mirrored.role, UserRole::Artist);
}
