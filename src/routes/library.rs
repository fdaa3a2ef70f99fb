// SPDX-License-Identifier: MIT

//! Personal library routes: favorites, playlists and listening history.
//!
//! Track metadata arrives with the mutation request and is cached as a
//! [`TrackSnapshot`] so list endpoints never have to call the catalog API.

use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::library::{FavoriteRecord, HistoryDoc, Playlist, TrackSnapshot};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/favorites", get(list_favorites).post(add_favorite))
        .route("/api/favorites/{track_id}", delete(remove_favorite))
        .route("/api/playlists", get(list_playlists).post(create_playlist))
        .route("/api/playlists/{id}", get(get_playlist))
        .route("/api/playlists/{id}/tracks", post(add_playlist_track))
        .route(
            "/api/playlists/{id}/tracks/{track_id}",
            delete(remove_playlist_track),
        )
        .route("/api/history", get(get_history).post(record_play))
}

// ─── Shared DTOs ─────────────────────────────────────────────

/// Track metadata sent alongside favorite/playlist/history mutations.
/// Snapshots are written once per track ID; later writes are ignored.
#[derive(Debug, Deserialize, Validate)]
pub struct TrackUpsertRequest {
    #[validate(length(min = 1, message = "track_id must not be empty"))]
    pub track_id: String,
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[serde(default)]
    pub artist_names: Vec<String>,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl TrackUpsertRequest {
    fn into_snapshot(self, now: &str) -> TrackSnapshot {
        TrackSnapshot {
            track_id: self.track_id,
            name: self.name,
            artist_names: self.artist_names,
            album_name: self.album_name,
            image_url: self.image_url,
            preview_url: self.preview_url,
            duration_ms: self.duration_ms,
            cached_at: now.to_string(),
        }
    }
}

// ─── Favorites ───────────────────────────────────────────────

#[derive(Serialize)]
pub struct FavoritesResponse {
    pub tracks: Vec<TrackSnapshot>,
}

/// Favorite a track, caching its metadata on first sight.
async fn add_favorite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<TrackUpsertRequest>,
) -> Result<Json<FavoriteRecord>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let now = chrono::Utc::now().to_rfc3339();
    let track_id = payload.track_id.clone();
    state
        .db
        .upsert_track_if_absent(&payload.into_snapshot(&now))
        .await?;

    let record = FavoriteRecord {
        user_id: user.uid.clone(),
        track_id,
        added_at: now,
    };
    state.db.add_favorite(&record).await?;
    tracing::debug!(uid = %user.uid, track_id = %record.track_id, "Favorite added");

    Ok(Json(record))
}

/// List the user's favorites as resolved track snapshots, newest first.
async fn list_favorites(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<FavoritesResponse>> {
    let records = state.db.list_favorites(&user.uid).await?;
    let ids: Vec<String> = records.into_iter().map(|r| r.track_id).collect();
    let tracks = state.db.resolve_tracks(&ids).await?;

    Ok(Json(FavoritesResponse { tracks }))
}

async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(track_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.db.remove_favorite(&user.uid, &track_id).await?;
    Ok(Json(serde_json::json!({ "removed": true })))
}

// ─── Playlists ───────────────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct CreatePlaylistRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize)]
pub struct PlaylistDetail {
    #[serde(flatten)]
    pub playlist: Playlist,
    pub tracks: Vec<TrackSnapshot>,
}

async fn create_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreatePlaylistRequest>,
) -> Result<Json<Playlist>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let now = chrono::Utc::now().to_rfc3339();
    let playlist = Playlist {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name,
        description: payload.description,
        user_id: user.uid.clone(),
        track_ids: Vec::new(),
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.upsert_playlist(&playlist).await?;
    tracing::info!(uid = %user.uid, playlist_id = %playlist.id, "Playlist created");

    Ok(Json(playlist))
}

async fn list_playlists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Playlist>>> {
    let playlists = state.db.list_playlists_for_user(&user.uid).await?;
    Ok(Json(playlists))
}

/// Fetch one playlist with its tracks resolved, owner-only.
async fn get_playlist(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<PlaylistDetail>> {
    let playlist = load_owned_playlist(&state, &user.uid, &id).await?;
    let tracks = state.db.resolve_tracks(&playlist.track_ids).await?;

    Ok(Json(PlaylistDetail { playlist, tracks }))
}

/// Append a track to a playlist. Adding a track that is already present
/// is a no-op rather than an error.
async fn add_playlist_track(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(payload): Json<TrackUpsertRequest>,
) -> Result<Json<Playlist>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut playlist = load_owned_playlist(&state, &user.uid, &id).await?;

    let now = chrono::Utc::now().to_rfc3339();
    let track_id = payload.track_id.clone();
    state
        .db
        .upsert_track_if_absent(&payload.into_snapshot(&now))
        .await?;

    if !playlist.track_ids.contains(&track_id) {
        playlist.track_ids.push(track_id);
        playlist.updated_at = now;
        state.db.upsert_playlist(&playlist).await?;
    }

    Ok(Json(playlist))
}

async fn remove_playlist_track(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, track_id)): Path<(String, String)>,
) -> Result<Json<Playlist>> {
    let mut playlist = load_owned_playlist(&state, &user.uid, &id).await?;

    playlist.track_ids.retain(|t| t != &track_id);
    playlist.updated_at = chrono::Utc::now().to_rfc3339();
    state.db.upsert_playlist(&playlist).await?;

    Ok(Json(playlist))
}

/// Load a playlist and verify ownership. Someone else's playlist is
/// indistinguishable from a missing one.
async fn load_owned_playlist(
    state: &AppState,
    uid: &str,
    playlist_id: &str,
) -> Result<Playlist> {
    state
        .db
        .get_playlist(playlist_id)
        .await?
        .filter(|p| p.user_id == uid)
        .ok_or_else(|| AppError::NotFound(format!("Playlist {playlist_id} not found")))
}

// ─── History ─────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HistoryResponse {
    pub tracks: Vec<TrackSnapshot>,
    pub updated_at: String,
}

/// Record a play. History is deduped per track and capped server-side.
async fn record_play(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<TrackUpsertRequest>,
) -> Result<Json<HistoryDoc>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let now = chrono::Utc::now().to_rfc3339();
    let track_id = payload.track_id.clone();
    state
        .db
        .upsert_track_if_absent(&payload.into_snapshot(&now))
        .await?;

    let mut history = state.db.get_history(&user.uid).await?.unwrap_or_default();
    history.record_play(&track_id, &now);
    state.db.set_history(&user.uid, &history).await?;

    Ok(Json(history))
}

/// Listening history as resolved track snapshots, most recent first.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<HistoryResponse>> {
    let history = state.db.get_history(&user.uid).await?.unwrap_or_default();
    let ids: Vec<String> = history.entries.iter().map(|e| e.track_id.clone()).collect();
    let tracks = state.db.resolve_tracks(&ids).await?;

    Ok(Json(HistoryResponse {
        tracks,
        updated_at: history.updated_at,
    }))
}
