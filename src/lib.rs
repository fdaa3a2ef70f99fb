// SPDX-License-Identifier: MIT

//! Tonemint: backend API for a music-NFT marketplace front end.
//!
//! This crate provides session management against an external identity
//! provider, a token-managed client for the external music catalog API,
//! user library storage (favorites, playlists, history) in Firestore, and
//! a simulated wallet/checkout flow.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::FirestoreDb;
use services::{CatalogService, HomeFeedCache, PaymentService, SessionService};

/// Shared application state, injected at the composition root.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub sessions: SessionService,
    pub catalog: CatalogService,
    pub payments: PaymentService,
    pub home_feed: HomeFeedCache,
}
