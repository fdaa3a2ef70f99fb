// SPDX-License-Identifier: MIT

//! Session service: login, registration, logout and user mirroring.
//!
//! Sign-in happens against the external identity provider; on success the
//! user document is fetched from Firestore or created with default role
//! `user`, mirroring the provider's display name and photo. Sessions are
//! HS256 JWTs whose `jti` can be revoked; revocation is checked in-memory
//! so a logged-out token is rejected without any network call.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::middleware::auth::create_jwt;
use crate::models::{User, UserRole};
use crate::services::identity::{IdentityClient, IdentityUser};
use dashmap::DashSet;
use std::sync::Arc;

/// A signed-in session: the mirrored user plus a session JWT.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token: String,
}

/// Session service shared across all requests.
#[derive(Clone)]
pub struct SessionService {
    identity: IdentityClient,
    db: FirestoreDb,
    jwt_signing_key: Vec<u8>,
    /// JTIs of revoked (logged-out) sessions.
    revoked: Arc<DashSet<String>>,
}

impl SessionService {
    pub fn new(identity: IdentityClient, db: FirestoreDb, jwt_signing_key: Vec<u8>) -> Self {
        Self {
            identity,
            db,
            jwt_signing_key,
            revoked: Arc::new(DashSet::new()),
        }
    }

    /// Register a new account with a chosen role.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<Session, AppError> {
        let account = self.identity.sign_up(email, password).await?;

        // Best-effort: the account exists even if the display name write fails.
        if let Err(e) = self
            .identity
            .update_display_name(&account.id_token, name)
            .await
        {
            tracing::warn!(error = %e, "Failed to set display name, continuing");
        }

        let now = chrono::Utc::now().to_rfc3339();
        let user = User {
            uid: account.local_id.clone(),
            name: name.to_string(),
            email: email.to_string(),
            role,
            profile_image: None,
            created_at: now.clone(),
            updated_at: now,
        };
        self.db.upsert_user(&user).await?;

        tracing::info!(uid = %user.uid, role = ?role, "User registered");
        self.issue(user)
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let account = self.identity.sign_in_password(email, password).await?;
        let user = self.get_or_create_user(&account).await?;

        tracing::info!(uid = %user.uid, "User logged in");
        self.issue(user)
    }

    /// Sign in with a Google ID token from a federated popup.
    pub async fn login_with_google(&self, google_id_token: &str) -> Result<Session, AppError> {
        let account = self.identity.sign_in_with_google(google_id_token).await?;
        let user = self.get_or_create_user(&account).await?;

        tracing::info!(uid = %user.uid, "User logged in via Google");
        self.issue(user)
    }

    /// Revoke a session by JTI. Idempotent.
    pub fn logout(&self, jti: &str) {
        self.revoked.insert(jti.to_string());
        tracing::info!(jti, "Session revoked");
    }

    /// True if this session JTI has been logged out.
    pub fn is_revoked(&self, jti: &str) -> bool {
        self.revoked.contains(jti)
    }

    /// Fetch the mirrored user document, creating it with default role
    /// `user` and the provider's display name/photo when absent.
    async fn get_or_create_user(&self, account: &IdentityUser) -> Result<User, AppError> {
        if let Some(existing) = self.db.get_user(&account.local_id).await? {
            return Ok(existing);
        }

        let now = chrono::Utc::now().to_rfc3339();
        let user = User {
            uid: account.local_id.clone(),
            name: account
                .display_name
                .clone()
                .unwrap_or_else(|| "User".to_string()),
            email: account.email.clone().unwrap_or_default(),
            role: UserRole::User,
            profile_image: account.photo_url.clone(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.db.upsert_user(&user).await?;

        tracing::info!(uid = %user.uid, "Mirrored new user document");
        Ok(user)
    }

    fn issue(&self, user: User) -> Result<Session, AppError> {
        let token = create_jwt(&user.uid, user.role, &self.jwt_signing_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;
        Ok(Session { user, token })
    }
}
