// SPDX-License-Identifier: MIT

//! JWT session middleware.

use crate::error::AppError;
use crate::models::UserRole;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name set by the frontend after login.
pub const SESSION_COOKIE: &str = "tonemint_token";

/// Session lifetime: 7 days.
const SESSION_TTL_SECS: usize = 7 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity provider UID)
    pub sub: String,
    /// Role captured at sign-in
    pub role: UserRole,
    /// Token ID, used for revocation on logout
    pub jti: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from a session JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub uid: String,
    pub role: UserRole,
}

/// Middleware that requires a valid, non-revoked session JWT.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&jar, &request).ok_or(AppError::Unauthorized)?;

    let claims =
        decode_claims(&token, &state.config.jwt_signing_key).ok_or(AppError::InvalidToken)?;

    // Revocation is an in-memory check: a logged-out session is rejected
    // here without touching the database or any provider.
    if state.sessions.is_revoked(&claims.jti) {
        return Err(AppError::InvalidToken);
    }

    let auth_user = AuthUser {
        uid: claims.sub,
        role: claims.role,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Pull the session token from the cookie jar or the Authorization header.
pub fn extract_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|t| t.to_string())
}

/// Decode and validate a session JWT, returning its claims.
pub fn decode_claims(token: &str, signing_key: &[u8]) -> Option<Claims> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &key, &validation)
        .ok()
        .map(|data| data.claims)
}

/// Create a JWT for a user session.
pub fn create_jwt(uid: &str, role: UserRole, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: uid.to_string(),
        role,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
