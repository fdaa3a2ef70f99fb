// SPDX-License-Identifier: MIT

//! Session authentication routes and the catalog OAuth callback.

use axum::{
    extract::{Query, Request, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{decode_claims, extract_token};
use crate::models::{User, UserRole};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google", post(login_with_google))
        .route("/auth/logout", post(logout))
        .route("/auth/catalog/callback", get(catalog_callback))
}

// ─── Session Endpoints ───────────────────────────────────────

#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
    pub role: UserRole,
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct GoogleLoginRequest {
    #[validate(length(min = 1, message = "id_token is required"))]
    pub id_token: String,
}

/// User shape returned to the frontend.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub profile_image: Option<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            uid: user.uid,
            name: user.name,
            email: user.email,
            role: user.role,
            profile_image: user.profile_image,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Register a new account with a chosen role.
async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let session = state
        .sessions
        .register(&payload.name, &payload.email, &payload.password, payload.role)
        .await?;

    Ok(Json(AuthResponse {
        token: session.token,
        user: session.user.into(),
    }))
}

/// Email/password login.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let session = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?;

    Ok(Json(AuthResponse {
        token: session.token,
        user: session.user.into(),
    }))
}

/// Federated login with a Google ID token from a popup sign-in.
async fn login_with_google(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<Json<AuthResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let session = state.sessions.login_with_google(&payload.id_token).await?;

    Ok(Json(AuthResponse {
        token: session.token,
        user: session.user.into(),
    }))
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Revoke the presented session. Idempotent: succeeds even when no valid
/// session token accompanies the request.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> Json<LogoutResponse> {
    if let Some(token) = extract_token(&jar, &request) {
        if let Some(claims) = decode_claims(&token, &state.config.jwt_signing_key) {
            state.sessions.logout(&claims.jti);
        }
    }
    Json(LogoutResponse { success: true })
}

// ─── Catalog OAuth State ─────────────────────────────────────

/// Sign a catalog OAuth state parameter binding the session UID and the
/// frontend URL to return to.
pub fn sign_state(uid: &str, frontend_url: &str, secret: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    // Payload: "uid|frontend_url|timestamp_hex"
    let payload = format!("{}|{}|{:x}", uid, frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature).as_bytes()))
}

/// Verify the HMAC signature and decode `(uid, frontend_url)` from the
/// OAuth state parameter.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<(String, String)> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "uid|frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(4, '|').collect();
    if parts.len() != 4 {
        return None;
    }

    let (uid, frontend_url, timestamp_hex, signature_hex) =
        (parts[0], parts[1], parts[2], parts[3]);

    let payload = format!("{}|{}|{}", uid, frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());
    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some((uid.to_string(), frontend_url.to_string()))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    state: String,
    #[serde(default)]
    error: Option<String>,
}

/// Catalog OAuth callback: verify state, exchange the code, persist the
/// user's catalog tokens, then bounce back to the frontend.
async fn catalog_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let decoded = verify_and_decode_state(&params.state, &state.config.oauth_state_key);

    let (uid, frontend_url) = match decoded {
        Some(pair) => pair,
        None => {
            tracing::warn!("Invalid or tampered catalog OAuth state");
            let redirect = format!("{}/callback?error=invalid_state", state.config.frontend_url);
            return Ok(Redirect::temporary(&redirect));
        }
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Catalog OAuth error");
        let redirect = format!("{}/callback?error={}", frontend_url, error);
        return Ok(Redirect::temporary(&redirect));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    state.catalog.link_account(&uid, &code).await?;

    tracing::info!(uid = %uid, "Catalog account linked via OAuth callback");
    Ok(Redirect::temporary(&format!(
        "{}/callback?linked=1",
        frontend_url
    )))
}
