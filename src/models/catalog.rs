// SPDX-License-Identifier: MIT

//! Typed response schemas for the external music catalog API.
//!
//! Every payload crossing the API boundary is deserialized into one of
//! these shapes; nothing downstream handles raw JSON.

use serde::{Deserialize, Serialize};

/// Response from the catalog token endpoint (both grant types).
///
/// `refresh_token` is present for the authorization-code grant and for
/// refreshes that rotate the token; never for client credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Error body returned by the catalog token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimplifiedArtist {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SimplifiedArtist>,
    #[serde(default)]
    pub album: Option<Album>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// Generic paging envelope used by list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    #[serde(default)]
    pub next: Option<String>,
}

/// Search response; each section is present only when its type was requested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Paging<Track>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<Paging<Artist>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub albums: Option<Paging<Album>>,
}

/// Catalog-side user profile (read-only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Catalog-side playlist summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// One entry of a catalog playlist's track list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// None for tracks that have been removed from the catalog.
    pub track: Option<Track>,
    #[serde(default)]
    pub added_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistTracks {
    pub items: Vec<PlaylistItem>,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReleases {
    pub albums: Paging<Album>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturedPlaylists {
    #[serde(default)]
    pub message: Option<String>,
    pub playlists: Paging<CatalogPlaylist>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendations {
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenreSeeds {
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistTopTracks {
    pub tracks: Vec<Track>,
}
