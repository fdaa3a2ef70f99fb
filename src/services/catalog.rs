// SPDX-License-Identifier: MIT

//! Music catalog API client (Spotify Web API surface).
//!
//! Handles:
//! - Token endpoint exchanges (authorization code, refresh, client credentials)
//! - Read endpoints: profile, playlists, tracks, search, artists, browse,
//!   recommendations, genre seeds
//! - Rejected-token detection (drives the refresh-then-retry-once rule)

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;

use crate::models::catalog::{
    Album, Artist, ArtistTopTracks, CatalogPlaylist, CatalogProfile, FeaturedPlaylists,
    GenreSeeds, NewReleases, Paging, PlaylistTracks, Recommendations, SearchResults,
    TokenErrorBody, TokenResponse, Track,
};

/// Scopes requested when linking a user's catalog account.
const USER_SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "playlist-read-private",
    "playlist-read-collaborative",
    "user-library-read",
    "user-top-read",
    "user-read-recently-played",
    "user-follow-read",
];

/// Low-level catalog API client.
#[derive(Clone)]
pub struct CatalogClient {
    http: reqwest::Client,
    api_base: String,
    accounts_base: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl CatalogClient {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: "https://api.spotify.com/v1".to_string(),
            accounts_base: "https://accounts.spotify.com".to_string(),
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// Override both base URLs (tests against a local stub).
    pub fn with_base_urls(mut self, api_base: String, accounts_base: String) -> Self {
        self.api_base = api_base;
        self.accounts_base = accounts_base;
        self
    }

    /// Build the user-facing authorization URL.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.accounts_base,
            self.client_id,
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&USER_SCOPES.join(" ")),
            state,
        )
    }

    // ─── Token Endpoint ──────────────────────────────────────────

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ])
        .await
    }

    /// Refresh an expired user access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// App-level client-credentials exchange.
    pub async fn client_credentials(&self) -> Result<TokenResponse, AppError> {
        self.token_request(&[("grant_type", "client_credentials")]).await
    }

    /// POST to the token endpoint with HTTP Basic client authentication.
    ///
    /// Provider error bodies surface as `Token` errors; the caller decides
    /// whether to retry, nothing is retried here.
    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let basic = STANDARD.encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .header("Authorization", format!("Basic {}", basic))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::Token(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Token(format!("Token response read failed: {}", e)))?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<TokenErrorBody>(&body) {
                Ok(err) => {
                    let description = err.error_description.unwrap_or_default();
                    AppError::Token(format!("{}: {}", err.error, description))
                }
                Err(_) => AppError::Token(format!("HTTP {}: {}", status, body)),
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::Token(format!("Malformed token response: {}", e)))
    }

    // ─── Read Endpoints ──────────────────────────────────────────

    /// Get the catalog profile of the linked user.
    pub async fn get_profile(&self, access_token: &str) -> Result<CatalogProfile, AppError> {
        self.get_json(&format!("{}/me", self.api_base), access_token, &[])
            .await
    }

    /// List the linked user's catalog playlists.
    pub async fn get_user_playlists(
        &self,
        access_token: &str,
    ) -> Result<Paging<CatalogPlaylist>, AppError> {
        self.get_json(&format!("{}/me/playlists", self.api_base), access_token, &[])
            .await
    }

    /// Get the tracks of a catalog playlist.
    pub async fn get_playlist_tracks(
        &self,
        access_token: &str,
        playlist_id: &str,
    ) -> Result<PlaylistTracks, AppError> {
        let url = format!("{}/playlists/{}/tracks", self.api_base, playlist_id);
        self.get_json(&url, access_token, &[]).await
    }

    /// Get a track by ID.
    pub async fn get_track(&self, access_token: &str, track_id: &str) -> Result<Track, AppError> {
        let url = format!("{}/tracks/{}", self.api_base, track_id);
        self.get_json(&url, access_token, &[]).await
    }

    /// Search the catalog.
    pub async fn search(
        &self,
        access_token: &str,
        query: &str,
        types: &str,
        limit: u32,
    ) -> Result<SearchResults, AppError> {
        let url = format!("{}/search", self.api_base);
        self.get_json(
            &url,
            access_token,
            &[
                ("q", query.to_string()),
                ("type", types.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    /// Get an artist by ID.
    pub async fn get_artist(&self, access_token: &str, artist_id: &str) -> Result<Artist, AppError> {
        let url = format!("{}/artists/{}", self.api_base, artist_id);
        self.get_json(&url, access_token, &[]).await
    }

    /// Get an artist's top tracks for a market.
    pub async fn get_artist_top_tracks(
        &self,
        access_token: &str,
        artist_id: &str,
        market: &str,
    ) -> Result<ArtistTopTracks, AppError> {
        let url = format!("{}/artists/{}/top-tracks", self.api_base, artist_id);
        self.get_json(&url, access_token, &[("market", market.to_string())])
            .await
    }

    /// Get an artist's albums.
    pub async fn get_artist_albums(
        &self,
        access_token: &str,
        artist_id: &str,
    ) -> Result<Paging<Album>, AppError> {
        let url = format!("{}/artists/{}/albums", self.api_base, artist_id);
        self.get_json(&url, access_token, &[]).await
    }

    /// Browse new releases.
    pub async fn get_new_releases(&self, access_token: &str) -> Result<NewReleases, AppError> {
        let url = format!("{}/browse/new-releases", self.api_base);
        self.get_json(&url, access_token, &[]).await
    }

    /// Browse featured playlists.
    pub async fn get_featured_playlists(
        &self,
        access_token: &str,
    ) -> Result<FeaturedPlaylists, AppError> {
        let url = format!("{}/browse/featured-playlists", self.api_base);
        self.get_json(&url, access_token, &[]).await
    }

    /// Get recommendations for the given seeds.
    pub async fn get_recommendations(
        &self,
        access_token: &str,
        seeds: &RecommendationSeeds,
    ) -> Result<Recommendations, AppError> {
        let url = format!("{}/recommendations", self.api_base);
        self.get_json(&url, access_token, &seeds.query_pairs()).await
    }

    /// List available genre seeds.
    pub async fn get_genre_seeds(&self, access_token: &str) -> Result<GenreSeeds, AppError> {
        let url = format!("{}/recommendations/available-genre-seeds", self.api_base);
        self.get_json(&url, access_token, &[]).await
    }

    /// Generic GET request with bearer auth and JSON response.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .query(query)
            .send()
            .await
            .map_err(|e| AppError::CatalogApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                tracing::warn!("Catalog rate limit hit (429)");
                return Err(AppError::CatalogApi(
                    AppError::CATALOG_RATE_LIMIT.to_string(),
                ));
            }

            // Bearer token rejected; the service retries once after a refresh
            if status.as_u16() == 401 {
                return Err(AppError::CatalogApi(
                    AppError::CATALOG_TOKEN_ERROR.to_string(),
                ));
            }

            return Err(AppError::CatalogApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::CatalogApi(format!("JSON parse error: {}", e)))
    }
}

/// Seed parameters for the recommendations endpoint.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct RecommendationSeeds {
    pub seed_tracks: Option<String>,
    pub seed_artists: Option<String>,
    pub seed_genres: Option<String>,
    pub limit: Option<u32>,
}

impl RecommendationSeeds {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(tracks) = &self.seed_tracks {
            pairs.push(("seed_tracks", tracks.clone()));
        }
        if let Some(artists) = &self.seed_artists {
            pairs.push(("seed_artists", artists.clone()));
        }
        if let Some(genres) = &self.seed_genres {
            pairs.push(("seed_genres", genres.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CatalogService - token-managed access to the catalog
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::FirestoreDb;
use crate::services::token::TokenManager;
use std::future::Future;

/// Default number of search results per section.
const SEARCH_LIMIT: u32 = 20;

/// High-level catalog service.
///
/// Browse endpoints run on the app-level client-credentials token; the
/// profile and playlist endpoints require a linked user account. Either
/// way, a fetch hitting a rejected token triggers a refresh and exactly
/// one retry before the error surfaces.
#[derive(Clone)]
pub struct CatalogService {
    client: CatalogClient,
    tokens: TokenManager,
}

impl CatalogService {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        db: FirestoreDb,
    ) -> Self {
        let client = CatalogClient::new(client_id, client_secret, redirect_uri);
        let tokens = TokenManager::new(client.clone(), db);
        Self { client, tokens }
    }

    /// Build from pre-constructed parts (tests inject stub base URLs).
    pub fn from_parts(client: CatalogClient, tokens: TokenManager) -> Self {
        Self { client, tokens }
    }

    // ─── Account Linking ─────────────────────────────────────────

    pub fn authorize_url(&self, state: &str) -> String {
        self.client.authorize_url(state)
    }

    pub async fn link_account(&self, uid: &str, code: &str) -> Result<(), AppError> {
        self.tokens.link_account(uid, code).await
    }

    pub async fn unlink_account(&self, uid: &str) -> Result<(), AppError> {
        self.tokens.unlink_account(uid).await
    }

    // ─── Retry-Once Helpers ──────────────────────────────────────

    async fn with_user_token<T, F, Fut>(&self, uid: &str, f: F) -> Result<T, AppError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let token = self.tokens.user_access_token(uid).await?;
        match f(token).await {
            Err(e) if e.is_catalog_token_error() => {
                let token = self.tokens.force_refresh_user(uid).await?;
                f(token).await
            }
            other => other,
        }
    }

    async fn with_app_token<T, F, Fut>(&self, f: F) -> Result<T, AppError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let token = self.tokens.app_access_token().await?;
        match f(token).await {
            Err(e) if e.is_catalog_token_error() => {
                let token = self.tokens.force_refresh_app().await?;
                f(token).await
            }
            other => other,
        }
    }

    // ─── User-Flow Endpoints ─────────────────────────────────────

    pub async fn profile(&self, uid: &str) -> Result<CatalogProfile, AppError> {
        let client = self.client.clone();
        self.with_user_token(uid, move |token| {
            let client = client.clone();
            async move { client.get_profile(&token).await }
        })
        .await
    }

    pub async fn user_playlists(&self, uid: &str) -> Result<Paging<CatalogPlaylist>, AppError> {
        let client = self.client.clone();
        self.with_user_token(uid, move |token| {
            let client = client.clone();
            async move { client.get_user_playlists(&token).await }
        })
        .await
    }

    pub async fn playlist_tracks(
        &self,
        uid: &str,
        playlist_id: &str,
    ) -> Result<PlaylistTracks, AppError> {
        let client = self.client.clone();
        let playlist_id = playlist_id.to_string();
        self.with_user_token(uid, move |token| {
            let client = client.clone();
            let playlist_id = playlist_id.clone();
            async move { client.get_playlist_tracks(&token, &playlist_id).await }
        })
        .await
    }

    // ─── App-Flow Endpoints ──────────────────────────────────────

    pub async fn search(
        &self,
        query: &str,
        types: &str,
        limit: Option<u32>,
    ) -> Result<SearchResults, AppError> {
        let client = self.client.clone();
        let query = query.to_string();
        let types = types.to_string();
        let limit = limit.unwrap_or(SEARCH_LIMIT);
        self.with_app_token(move |token| {
            let client = client.clone();
            let query = query.clone();
            let types = types.clone();
            async move { client.search(&token, &query, &types, limit).await }
        })
        .await
    }

    pub async fn track(&self, track_id: &str) -> Result<Track, AppError> {
        let client = self.client.clone();
        let track_id = track_id.to_string();
        self.with_app_token(move |token| {
            let client = client.clone();
            let track_id = track_id.clone();
            async move { client.get_track(&token, &track_id).await }
        })
        .await
    }

    pub async fn artist(&self, artist_id: &str) -> Result<Artist, AppError> {
        let client = self.client.clone();
        let artist_id = artist_id.to_string();
        self.with_app_token(move |token| {
            let client = client.clone();
            let artist_id = artist_id.clone();
            async move { client.get_artist(&token, &artist_id).await }
        })
        .await
    }

    pub async fn artist_top_tracks(
        &self,
        artist_id: &str,
        market: &str,
    ) -> Result<ArtistTopTracks, AppError> {
        let client = self.client.clone();
        let artist_id = artist_id.to_string();
        let market = market.to_string();
        self.with_app_token(move |token| {
            let client = client.clone();
            let artist_id = artist_id.clone();
            let market = market.clone();
            async move {
                client
                    .get_artist_top_tracks(&token, &artist_id, &market)
                    .await
            }
        })
        .await
    }

    pub async fn artist_albums(&self, artist_id: &str) -> Result<Paging<Album>, AppError> {
        let client = self.client.clone();
        let artist_id = artist_id.to_string();
        self.with_app_token(move |token| {
            let client = client.clone();
            let artist_id = artist_id.clone();
            async move { client.get_artist_albums(&token, &artist_id).await }
        })
        .await
    }

    pub async fn new_releases(&self) -> Result<NewReleases, AppError> {
        let client = self.client.clone();
        self.with_app_token(move |token| {
            let client = client.clone();
            async move { client.get_new_releases(&token).await }
        })
        .await
    }

    pub async fn featured_playlists(&self) -> Result<FeaturedPlaylists, AppError> {
        let client = self.client.clone();
        self.with_app_token(move |token| {
            let client = client.clone();
            async move { client.get_featured_playlists(&token).await }
        })
        .await
    }

    pub async fn recommendations(
        &self,
        seeds: &RecommendationSeeds,
    ) -> Result<Recommendations, AppError> {
        let client = self.client.clone();
        let seeds = seeds.clone();
        self.with_app_token(move |token| {
            let client = client.clone();
            let seeds = seeds.clone();
            async move { client.get_recommendations(&token, &seeds).await }
        })
        .await
    }

    pub async fn genre_seeds(&self) -> Result<GenreSeeds, AppError> {
        let client = self.client.clone();
        self.with_app_token(move |token| {
            let client = client.clone();
            async move { client.get_genre_seeds(&token).await }
        })
        .await
    }
}
