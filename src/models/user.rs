// SPDX-License-Identifier: MIT

//! User model for storage and API.

use serde::{Deserialize, Serialize};

/// Role assigned at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Artist,
    #[default]
    User,
}

/// User profile stored in Firestore, mirrored from the identity provider
/// on first sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Identity provider UID (also used as document ID)
    pub uid: String,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
    /// Role chosen at registration (defaults to `user` when mirrored)
    #[serde(default)]
    pub role: UserRole,
    /// Profile picture URL
    pub profile_image: Option<String>,
    /// When the document was created (ISO 8601)
    pub created_at: String,
    /// Last profile update (ISO 8601)
    pub updated_at: String,
}

/// A user's catalog OAuth tokens, stored per UID.
///
/// The expiry is computed at issuance (`issued_at + expires_in`) and never
/// re-validated against server time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCatalogTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
}
