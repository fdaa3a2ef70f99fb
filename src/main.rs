// SPDX-License-Identifier: MIT

//! Tonemint API Server
//!
//! Serves the integration layer for the music-NFT marketplace front end:
//! sessions, catalog access, user library and the simulated checkout flow.

use std::sync::Arc;
use tonemint::{
    config::Config,
    db::FirestoreDb,
    services::{CatalogService, HomeFeedCache, IdentityClient, PaymentService, SessionService},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Tonemint API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Session service over the external identity provider
    let identity = IdentityClient::new(config.identity_api_key.clone());
    let sessions = SessionService::new(identity, db.clone(), config.jwt_signing_key.clone());

    // Catalog service with token management
    let catalog = CatalogService::new(
        config.catalog_client_id.clone(),
        config.catalog_client_secret.clone(),
        config.catalog_redirect_uri.clone(),
        db.clone(),
    );
    tracing::info!("Catalog service initialized");

    // Simulated checkout flow with the default random executor
    let payments = PaymentService::default();

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        sessions,
        catalog,
        payments,
        home_feed: HomeFeedCache::default(),
    });

    // Build router
    let app = tonemint::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tonemint=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
