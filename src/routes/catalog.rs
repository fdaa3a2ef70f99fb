// SPDX-License-Identifier: MIT

//! Catalog proxy routes.
//!
//! Browse endpoints run on the app-level token; the `me` endpoints require
//! the user to have linked their catalog account via OAuth.

use axum::{
    extract::{Path, Query, State},
    response::Redirect,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::catalog::{
    Album, Artist, ArtistTopTracks, CatalogPlaylist, CatalogProfile, FeaturedPlaylists,
    GenreSeeds, NewReleases, Paging, PlaylistTracks, Recommendations, SearchResults, Track,
};
use crate::routes::auth::sign_state;
use crate::services::fetch::{FetchState, HomeFeed};
use crate::services::RecommendationSeeds;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/catalog/connect", get(connect_start).delete(disconnect))
        .route("/api/catalog/home", get(home))
        .route("/api/catalog/search", get(search))
        .route("/api/catalog/tracks/{id}", get(track))
        .route("/api/catalog/artists/{id}", get(artist))
        .route("/api/catalog/artists/{id}/top-tracks", get(artist_top_tracks))
        .route("/api/catalog/artists/{id}/albums", get(artist_albums))
        .route("/api/catalog/new-releases", get(new_releases))
        .route("/api/catalog/featured-playlists", get(featured_playlists))
        .route("/api/catalog/recommendations", get(recommendations))
        .route("/api/catalog/genres", get(genres))
        .route("/api/catalog/me", get(me))
        .route("/api/catalog/me/playlists", get(me_playlists))
        .route("/api/catalog/playlists/{id}/tracks", get(playlist_tracks))
}

// ─── Account Linking ─────────────────────────────────────────

#[derive(Deserialize)]
pub struct ConnectParams {
    /// Frontend URL to return to after the OAuth dance.
    #[serde(default)]
    redirect_uri: Option<String>,
}

/// Start the catalog OAuth flow for the current user.
async fn connect_start(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ConnectParams>,
) -> Result<Redirect> {
    let frontend_url = params
        .redirect_uri
        .unwrap_or_else(|| state.config.frontend_url.clone());

    let oauth_state = sign_state(&user.uid, &frontend_url, &state.config.oauth_state_key)?;
    let url = state.catalog.authorize_url(&oauth_state);

    tracing::info!(uid = %user.uid, "Starting catalog OAuth flow");
    Ok(Redirect::temporary(&url))
}

/// Unlink the current user's catalog account.
async fn disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<serde_json::Value>> {
    state.catalog.unlink_account(&user.uid).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ─── Browse (app token) ──────────────────────────────────────

/// Dashboard feed snapshot: `{data, is_loading, error}`. Requests kick a
/// background refresh when the snapshot is stale; stale responses are
/// discarded by generation.
async fn home(State(state): State<Arc<AppState>>) -> Json<FetchState<HomeFeed>> {
    Json(state.home_feed.snapshot_and_refresh(state.catalog.clone()))
}

#[derive(Deserialize)]
pub struct SearchParams {
    q: String,
    /// Comma-separated list of result types.
    #[serde(default = "default_search_types", rename = "type")]
    types: String,
    #[serde(default)]
    limit: Option<u32>,
}

fn default_search_types() -> String {
    "track,artist,album".to_string()
}

/// Search the catalog.
async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResults>> {
    if params.q.trim().is_empty() {
        return Err(AppError::Validation("Search query is required".to_string()));
    }
    let results = state
        .catalog
        .search(&params.q, &params.types, params.limit)
        .await?;
    Ok(Json(results))
}

async fn track(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Track>> {
    Ok(Json(state.catalog.track(&id).await?))
}

async fn artist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Artist>> {
    Ok(Json(state.catalog.artist(&id).await?))
}

#[derive(Deserialize)]
pub struct MarketParams {
    #[serde(default = "default_market")]
    market: String,
}

fn default_market() -> String {
    "US".to_string()
}

async fn artist_top_tracks(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<MarketParams>,
) -> Result<Json<ArtistTopTracks>> {
    Ok(Json(
        state.catalog.artist_top_tracks(&id, &params.market).await?,
    ))
}

async fn artist_albums(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Paging<Album>>> {
    Ok(Json(state.catalog.artist_albums(&id).await?))
}

async fn new_releases(State(state): State<Arc<AppState>>) -> Result<Json<NewReleases>> {
    Ok(Json(state.catalog.new_releases().await?))
}

async fn featured_playlists(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FeaturedPlaylists>> {
    Ok(Json(state.catalog.featured_playlists().await?))
}

/// Recommendations are a pass-through to the catalog's endpoint.
async fn recommendations(
    State(state): State<Arc<AppState>>,
    Query(seeds): Query<RecommendationSeeds>,
) -> Result<Json<Recommendations>> {
    if seeds.seed_tracks.is_none() && seeds.seed_artists.is_none() && seeds.seed_genres.is_none() {
        return Err(AppError::Validation(
            "At least one of seed_tracks, seed_artists, seed_genres is required".to_string(),
        ));
    }
    Ok(Json(state.catalog.recommendations(&seeds).await?))
}

async fn genres(State(state): State<Arc<AppState>>) -> Result<Json<GenreSeeds>> {
    Ok(Json(state.catalog.genre_seeds().await?))
}

// ─── Linked Account (user token) ─────────────────────────────

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<CatalogProfile>> {
    Ok(Json(state.catalog.profile(&user.uid).await?))
}

async fn me_playlists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Paging<CatalogPlaylist>>> {
    Ok(Json(state.catalog.user_playlists(&user.uid).await?))
}

async fn playlist_tracks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PlaylistTracks>> {
    Ok(Json(state.catalog.playlist_tracks(&user.uid, &id).await?))
}
