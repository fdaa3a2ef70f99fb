// SPDX-License-Identifier: MIT

//! Client for the external identity provider (Identity Toolkit REST surface).
//!
//! Handles password sign-in, sign-up, federated Google sign-in and profile
//! updates. Provider error codes are mapped to human-readable `AppError::Auth`
//! messages; callers surface them inline.

use crate::error::AppError;
use serde::Deserialize;

/// Identity provider client.
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// A signed-in account as reported by the provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    /// Provider UID (document key for the mirrored user record)
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Provider ID token for the session that just signed in
    pub id_token: String,
}

/// Error envelope returned by the provider.
#[derive(Debug, Deserialize)]
struct IdentityErrorEnvelope {
    error: IdentityErrorBody,
}

#[derive(Debug, Deserialize)]
struct IdentityErrorBody {
    message: String,
}

impl IdentityClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            api_key,
        }
    }

    /// Override the provider base URL (tests against a local stub).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sign in with email and password.
    pub async fn sign_in_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<IdentityUser, AppError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        self.post_json("accounts:signInWithPassword", &body).await
    }

    /// Create a new account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<IdentityUser, AppError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "returnSecureToken": true,
        });
        self.post_json("accounts:signUp", &body).await
    }

    /// Sign in with a Google ID token obtained from a federated popup.
    pub async fn sign_in_with_google(&self, google_id_token: &str) -> Result<IdentityUser, AppError> {
        let body = serde_json::json!({
            "postBody": format!(
                "id_token={}&providerId=google.com",
                urlencoding::encode(google_id_token)
            ),
            "requestUri": "http://localhost",
            "returnSecureToken": true,
            "returnIdpCredential": true,
        });
        self.post_json("accounts:signInWithIdp", &body).await
    }

    /// Set the account's display name.
    pub async fn update_display_name(&self, id_token: &str, name: &str) -> Result<(), AppError> {
        let body = serde_json::json!({
            "idToken": id_token,
            "displayName": name,
            "returnSecureToken": false,
        });

        let response = self
            .http
            .post(self.endpoint("accounts:update"))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.map_error_response(response).await);
        }
        Ok(())
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}?key={}", self.base_url, method, self.api_key)
    }

    async fn post_json(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<IdentityUser, AppError> {
        let response = self
            .http
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Auth(format!("Identity provider unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(self.map_error_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("Malformed identity response: {}", e)))
    }

    async fn map_error_response(&self, response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        match serde_json::from_str::<IdentityErrorEnvelope>(&body) {
            Ok(envelope) => map_identity_error(&envelope.error.message),
            Err(_) => AppError::Auth(format!("Identity provider error (HTTP {})", status)),
        }
    }
}

/// Map provider error codes to messages the UI can show inline.
fn map_identity_error(code: &str) -> AppError {
    // Codes may carry a suffix, e.g. "WEAK_PASSWORD : Password should be..."
    let base = code.split_whitespace().next().unwrap_or(code);

    let message = match base {
        "EMAIL_EXISTS" => "An account with this email already exists",
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password"
        }
        "WEAK_PASSWORD" => "Password is too weak (minimum 6 characters)",
        "USER_DISABLED" => "This account has been disabled",
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later",
        other => {
            tracing::warn!(code = other, "Unrecognized identity provider error");
            return AppError::Auth(format!("Sign-in failed ({})", other));
        }
    };

    AppError::Auth(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_message(err: AppError) -> String {
        match err {
            AppError::Auth(msg) => msg,
            other => panic!("expected Auth error, got {:?}", other),
        }
    }

    #[test]
    fn maps_duplicate_email() {
        let msg = auth_message(map_identity_error("EMAIL_EXISTS"));
        assert!(msg.contains("already exists"));
    }

    #[test]
    fn maps_bad_credentials_without_leaking_which_field() {
        let not_found = auth_message(map_identity_error("EMAIL_NOT_FOUND"));
        let bad_password = auth_message(map_identity_error("INVALID_PASSWORD"));
        assert_eq!(not_found, bad_password);
    }

    #[test]
    fn maps_weak_password_with_suffix() {
        let msg = auth_message(map_identity_error(
            "WEAK_PASSWORD : Password should be at least 6 characters",
        ));
        assert!(msg.contains("too weak"));
    }
}
