// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (mirrored identity-provider profiles)
//! - Catalog tokens (per-user OAuth tokens)
//! - Track snapshots (catalog data copied on first reference)
//! - Playlists, favorites and listening history

use crate::db::collections;
use crate::error::AppError;
use crate::models::{FavoriteRecord, HistoryDoc, Playlist, StoredCatalogTokens, TrackSnapshot, User};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 20;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // Emulator connections are unauthenticated to avoid leaking local
        // credentials into the emulator process.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore (Emulator)");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by identity-provider UID.
    pub async fn get_user(&self, uid: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user document.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.uid)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Catalog Token Operations ────────────────────────────────

    /// Get stored catalog tokens for a user.
    pub async fn get_catalog_tokens(
        &self,
        uid: &str,
    ) -> Result<Option<StoredCatalogTokens>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CATALOG_TOKENS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store catalog tokens for a user.
    pub async fn set_catalog_tokens(
        &self,
        uid: &str,
        tokens: &StoredCatalogTokens,
    ) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CATALOG_TOKENS)
            .document_id(uid)
            .object(tokens)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete catalog tokens (on unlink).
    pub async fn delete_catalog_tokens(&self, uid: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::CATALOG_TOKENS)
            .document_id(uid)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Track Snapshot Operations ───────────────────────────────

    /// Get a track snapshot by catalog track ID.
    pub async fn get_track(&self, track_id: &str) -> Result<Option<TrackSnapshot>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TRACKS)
            .obj()
            .one(track_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a track snapshot if one does not already exist.
    ///
    /// Best-effort: a concurrent writer may win the race, which is fine
    /// because snapshots of the same track are interchangeable.
    pub async fn upsert_track_if_absent(&self, snapshot: &TrackSnapshot) -> Result<(), AppError> {
        if self.get_track(&snapshot.track_id).await?.is_some() {
            return Ok(());
        }

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TRACKS)
            .document_id(&snapshot.track_id)
            .object(snapshot)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Resolve a list of track IDs to their snapshots, skipping missing ones.
    /// Preserves the input order.
    pub async fn resolve_tracks(
        &self,
        track_ids: &[String],
    ) -> Result<Vec<TrackSnapshot>, AppError> {
        let results: Vec<Result<Option<TrackSnapshot>, AppError>> =
            stream::iter(track_ids.to_vec())
                .map(|id| async move { self.get_track(&id).await })
                .buffered(MAX_CONCURRENT_DB_OPS)
                .collect()
                .await;

        let mut snapshots = Vec::with_capacity(track_ids.len());
        for result in results {
            if let Some(snapshot) = result? {
                snapshots.push(snapshot);
            }
        }
        Ok(snapshots)
    }

    // ─── Favorite Operations ─────────────────────────────────────

    fn favorite_doc_id(uid: &str, track_id: &str) -> String {
        format!("{}_{}", uid, urlencoding::encode(track_id))
    }

    /// Store a favorite join record.
    pub async fn add_favorite(&self, record: &FavoriteRecord) -> Result<(), AppError> {
        let doc_id = Self::favorite_doc_id(&record.user_id, &record.track_id);
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::FAVORITES)
            .document_id(&doc_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Remove a favorite join record. Succeeds even if it did not exist.
    pub async fn remove_favorite(&self, uid: &str, track_id: &str) -> Result<(), AppError> {
        let doc_id = Self::favorite_doc_id(uid, track_id);
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::FAVORITES)
            .document_id(&doc_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List a user's favorites, most recently added first.
    pub async fn list_favorites(&self, uid: &str) -> Result<Vec<FavoriteRecord>, AppError> {
        let uid = uid.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::FAVORITES)
            .filter(move |q| q.for_all([q.field("user_id").eq(uid.clone())]))
            .order_by([("added_at", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Playlist Operations ─────────────────────────────────────

    /// Get a playlist by ID.
    pub async fn get_playlist(&self, playlist_id: &str) -> Result<Option<Playlist>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PLAYLISTS)
            .obj()
            .one(playlist_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a playlist document.
    pub async fn upsert_playlist(&self, playlist: &Playlist) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PLAYLISTS)
            .document_id(&playlist.id)
            .object(playlist)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List playlists owned by a user, most recently updated first.
    pub async fn list_playlists_for_user(&self, uid: &str) -> Result<Vec<Playlist>, AppError> {
        let uid = uid.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PLAYLISTS)
            .filter(move |q| q.for_all([q.field("user_id").eq(uid.clone())]))
            .order_by([("updated_at", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── History Operations ──────────────────────────────────────

    /// Get a user's listening history document.
    pub async fn get_history(&self, uid: &str) -> Result<Option<HistoryDoc>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::HISTORY)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a user's listening history document.
    pub async fn set_history(&self, uid: &str, history: &HistoryDoc) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::HISTORY)
            .document_id(uid)
            .object(history)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
