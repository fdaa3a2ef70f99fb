// SPDX-License-Identifier: MIT

//! Library models: track snapshots, favorites, playlists and history.

use serde::{Deserialize, Serialize};

/// Maximum number of entries kept in a user's listening history.
pub const HISTORY_LIMIT: usize = 50;

/// Catalog track data copied into the document store the first time a
/// track is favorited, playlisted or played. Keyed by the catalog track ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub track_id: String,
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
    /// When the snapshot was written (ISO 8601)
    pub cached_at: String,
}

/// Favorite join record, one document per (user, track) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoriteRecord {
    pub user_id: String,
    pub track_id: String,
    pub added_at: String,
}

/// User-owned playlist stored in the document store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub user_id: String,
    #[serde(default)]
    pub track_ids: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One listening-history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub track_id: String,
    pub played_at: String,
}

/// Listening history document, one per user, most recent first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryDoc {
    #[serde(default)]
    pub entries: Vec<HistoryEntry>,
    #[serde(default)]
    pub updated_at: String,
}

impl HistoryDoc {
    /// Record a play: dedupe by track, prepend, cap at [`HISTORY_LIMIT`].
    pub fn record_play(&mut self, track_id: &str, played_at: &str) {
        self.entries.retain(|e| e.track_id != track_id);
        self.entries.insert(
            0,
            HistoryEntry {
                track_id: track_id.to_string(),
                played_at: played_at.to_string(),
            },
        );
        self.entries.truncate(HISTORY_LIMIT);
        self.updated_at = played_at.to_string();
    }
}
