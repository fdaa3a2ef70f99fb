// SPDX-License-Identifier: MIT

use std::sync::Arc;
use tonemint::config::Config;
use tonemint::db::FirestoreDb;
use tonemint::routes::create_router;
use tonemint::services::{
    CatalogService, HomeFeedCache, IdentityClient, PaymentService, SessionService,
};
use tonemint::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Serve a stub provider on an ephemeral local port, returning its base URL.
#[allow(dead_code)]
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub listener");
    let addr = listener.local_addr().expect("Stub listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Stub server failed");
    });
    format!("http://{}", addr)
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies and the default
/// payment service. Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_payments(PaymentService::default())
}

/// Create a test app with an injected payment service so tests can
/// control settlement outcome and timing.
#[allow(dead_code)]
pub fn create_test_app_with_payments(
    payments: PaymentService,
) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();

    let identity = IdentityClient::new(config.identity_api_key.clone());
    let sessions = SessionService::new(identity, db.clone(), config.jwt_signing_key.clone());
    let catalog = CatalogService::new(
        config.catalog_client_id.clone(),
        config.catalog_client_secret.clone(),
        config.catalog_redirect_uri.clone(),
        db.clone(),
    );

    let state = Arc::new(AppState {
        config,
        db,
        sessions,
        catalog,
        payments,
        home_feed: HomeFeedCache::default(),
    });

    (create_router(state.clone()), state)
}
