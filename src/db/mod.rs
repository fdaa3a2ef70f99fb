// SPDX-License-Identifier: MIT

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Catalog OAuth tokens, keyed by user UID
    pub const CATALOG_TOKENS: &str = "catalog_tokens";
    /// Track snapshots copied from the catalog, keyed by track ID
    pub const TRACKS: &str = "tracks";
    pub const PLAYLISTS: &str = "playlists";
    /// Favorite join records, keyed by `{uid}_{track_id}`
    pub const FAVORITES: &str = "favorites";
    /// Listening history, one document per user UID
    pub const HISTORY: &str = "history";
}
