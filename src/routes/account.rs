// SPDX-License-Identifier: MIT

//! Current-user profile routes.

use axum::{
    extract::State,
    routing::get,
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::routes::auth::UserResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/me", get(get_me).put(update_me))
}

/// Get the current user's mirrored profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.uid)))?;

    Ok(Json(profile.into()))
}

#[derive(Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: Option<String>,
    pub profile_image: Option<String>,
}

/// Update the current user's display name and/or profile image.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let mut profile = state
        .db
        .get_user(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.uid)))?;

    if let Some(name) = payload.name {
        profile.name = name;
    }
    if let Some(image) = payload.profile_image {
        profile.profile_image = Some(image);
    }
    profile.updated_at = chrono::Utc::now().to_rfc3339();

    state.db.upsert_user(&profile).await?;
    tracing::info!(uid = %user.uid, "Profile updated");

    Ok(Json(profile.into()))
}
