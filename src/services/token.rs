// SPDX-License-Identifier: MIT

//! Catalog token lifecycle.
//!
//! Two independent flows, both producing a bearer token with an expiry
//! computed at issuance:
//! - User flow: authorization-code exchange, tokens persisted per UID in
//!   Firestore, refreshed transparently with the stored refresh token.
//!   Rotated refresh tokens are persisted when the provider returns one.
//! - App flow: client-credentials exchange, cached in memory only and
//!   refreshed lazily on the first call after expiry.
//!
//! Per-user locks serialize concurrent refreshes so only one task hits the
//! provider for a given UID at a time.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::catalog::TokenResponse;
use crate::models::StoredCatalogTokens;
use crate::services::catalog::CatalogClient;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A bearer token with its recorded expiry.
///
/// Invariant: `is_expired(now) == (now >= issued_at + expires_in)`. The
/// expiry is fixed at issuance and never re-validated against server time.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Build from a token endpoint response, stamping the expiry now.
    pub fn from_response(response: &TokenResponse, issued_at: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token.clone(),
            expires_at: issued_at + Duration::seconds(response.expires_in),
        }
    }

    /// A token is never used at or past its recorded expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Shared user-token cache type.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Shared per-user refresh locks.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Manages catalog tokens for both flows.
#[derive(Clone)]
pub struct TokenManager {
    client: CatalogClient,
    db: FirestoreDb,
    /// In-memory cache of user access tokens, keyed by UID.
    cache: TokenCache,
    /// Per-user mutex to serialize refresh operations.
    refresh_locks: RefreshLocks,
    /// Client-credentials token; no refresh token exists for this flow.
    app_token: Arc<Mutex<Option<CachedToken>>>,
}

impl TokenManager {
    pub fn new(client: CatalogClient, db: FirestoreDb) -> Self {
        Self {
            client,
            db,
            cache: Arc::new(DashMap::new()),
            refresh_locks: Arc::new(DashMap::new()),
            app_token: Arc::new(Mutex::new(None)),
        }
    }

    // ─── User Flow ───────────────────────────────────────────────

    /// Exchange an authorization code and persist the resulting tokens.
    pub async fn link_account(&self, uid: &str, code: &str) -> Result<(), AppError> {
        let issued_at = Utc::now();
        let response = self.client.exchange_code(code).await?;

        let refresh_token = response.refresh_token.clone().ok_or_else(|| {
            AppError::Token("Code exchange returned no refresh token".to_string())
        })?;

        let cached = CachedToken::from_response(&response, issued_at);
        let stored = StoredCatalogTokens {
            access_token: response.access_token.clone(),
            refresh_token,
            expires_at: cached.expires_at.to_rfc3339(),
        };

        self.db.set_catalog_tokens(uid, &stored).await?;
        self.cache.insert(uid.to_string(), cached);

        tracing::info!(uid, "Catalog account linked");
        Ok(())
    }

    /// Remove stored tokens and the cache entry.
    pub async fn unlink_account(&self, uid: &str) -> Result<(), AppError> {
        self.db.delete_catalog_tokens(uid).await?;
        self.cache.remove(uid);
        tracing::info!(uid, "Catalog account unlinked");
        Ok(())
    }

    /// Get a valid (non-expired) access token for the given user,
    /// refreshing transparently when the stored one has expired.
    pub async fn user_access_token(&self, uid: &str) -> Result<String, AppError> {
        let now = Utc::now();

        // Fast path: cached token still valid, no I/O.
        if let Some(cached) = self.cache.get(uid) {
            if !cached.is_expired(now) {
                return Ok(cached.access_token.clone());
            }
        }

        // Serialize refreshes per user; another task may finish first.
        let lock = self
            .refresh_locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(cached) = self.cache.get(uid) {
            if !cached.is_expired(now) {
                return Ok(cached.access_token.clone());
            }
        }

        let stored = self
            .db
            .get_catalog_tokens(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Catalog tokens for user {}", uid)))?;

        let expires_at = DateTime::parse_from_rfc3339(&stored.expires_at)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse expiry: {}", e)))?
            .with_timezone(&Utc);

        if now < expires_at {
            // Stored token still valid, cache and return.
            let cached = CachedToken {
                access_token: stored.access_token.clone(),
                expires_at,
            };
            self.cache.insert(uid.to_string(), cached);
            return Ok(stored.access_token);
        }

        self.refresh_stored(uid, stored).await
    }

    /// Refresh the user's token even if the cached one looks valid.
    ///
    /// Used for the retry-once rule after the catalog rejects a token the
    /// expiry said was still good.
    pub async fn force_refresh_user(&self, uid: &str) -> Result<String, AppError> {
        let lock = self
            .refresh_locks
            .entry(uid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        self.cache.remove(uid);

        let stored = self
            .db
            .get_catalog_tokens(uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Catalog tokens for user {}", uid)))?;

        self.refresh_stored(uid, stored).await
    }

    /// Exchange the stored refresh token, persisting the rotation.
    async fn refresh_stored(
        &self,
        uid: &str,
        stored: StoredCatalogTokens,
    ) -> Result<String, AppError> {
        tracing::info!(uid, "Refreshing catalog access token");

        let issued_at = Utc::now();
        let response = self.client.refresh_token(&stored.refresh_token).await?;
        let cached = CachedToken::from_response(&response, issued_at);

        // Keep the old refresh token unless the provider rotated it.
        let refresh_token = response
            .refresh_token
            .clone()
            .unwrap_or(stored.refresh_token);

        let updated = StoredCatalogTokens {
            access_token: response.access_token.clone(),
            refresh_token,
            expires_at: cached.expires_at.to_rfc3339(),
        };
        self.db.set_catalog_tokens(uid, &updated).await?;
        self.cache.insert(uid.to_string(), cached);

        Ok(response.access_token)
    }

    // ─── App Flow (client credentials) ───────────────────────────

    /// Get a valid app-level token, exchanging lazily on first use or
    /// after expiry.
    pub async fn app_access_token(&self) -> Result<String, AppError> {
        let mut slot = self.app_token.lock().await;
        let now = Utc::now();

        if let Some(cached) = slot.as_ref() {
            if !cached.is_expired(now) {
                return Ok(cached.access_token.clone());
            }
        }

        let response = self.client.client_credentials().await?;
        let cached = CachedToken::from_response(&response, now);
        let token = cached.access_token.clone();
        *slot = Some(cached);

        tracing::debug!("App token refreshed");
        Ok(token)
    }

    /// Discard the cached app token and exchange a fresh one.
    pub async fn force_refresh_app(&self) -> Result<String, AppError> {
        let mut slot = self.app_token.lock().await;

        let response = self.client.client_credentials().await?;
        let cached = CachedToken::from_response(&response, Utc::now());
        let token = cached.access_token.clone();
        *slot = Some(cached);

        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_response(expires_in: i64) -> TokenResponse {
        serde_json::from_value(serde_json::json!({
            "access_token": "tok",
            "token_type": "Bearer",
            "expires_in": expires_in,
        }))
        .unwrap()
    }

    #[test]
    fn expiry_is_issued_at_plus_expires_in() {
        let issued_at = Utc::now();
        let cached = CachedToken::from_response(&token_response(3600), issued_at);
        assert_eq!(cached.expires_at, issued_at + Duration::seconds(3600));
    }

    #[test]
    fn is_expired_matches_exact_boundary() {
        let issued_at = Utc::now();
        let cached = CachedToken::from_response(&token_response(3600), issued_at);

        assert!(!cached.is_expired(issued_at));
        assert!(!cached.is_expired(cached.expires_at - Duration::seconds(1)));
        // now == issued_at + expires_in counts as expired
        assert!(cached.is_expired(cached.expires_at));
        assert!(cached.is_expired(cached.expires_at + Duration::seconds(1)));
    }
}
