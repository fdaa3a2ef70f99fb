// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup and kept in memory; nothing here
//! is re-read at request time.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Music catalog OAuth client ID (public)
    pub catalog_client_id: String,
    /// Music catalog OAuth client secret
    pub catalog_client_secret: String,
    /// Redirect URI registered with the catalog provider
    pub catalog_redirect_uri: String,
    /// API key for the external identity provider
    pub identity_api_key: String,
    /// Frontend URL for redirects and CORS
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing the catalog OAuth state parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            catalog_client_id: env::var("CATALOG_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("CATALOG_CLIENT_ID"))?,
            catalog_client_secret: env::var("CATALOG_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("CATALOG_CLIENT_SECRET"))?,
            catalog_redirect_uri: env::var("CATALOG_REDIRECT_URI")
                .map_err(|_| ConfigError::Missing("CATALOG_REDIRECT_URI"))?,
            identity_api_key: env::var("IDENTITY_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("IDENTITY_API_KEY"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),
        })
    }

    /// Fixed config for tests.
    pub fn test_default() -> Self {
        Self {
            catalog_client_id: "test_client_id".to_string(),
            catalog_client_secret: "test_secret".to_string(),
            catalog_redirect_uri: "http://localhost:8080/auth/catalog/callback".to_string(),
            identity_api_key: "test_identity_key".to_string(),
            frontend_url: "http://localhost:3000".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("CATALOG_CLIENT_ID", "test_id");
        env::set_var("CATALOG_CLIENT_SECRET", "test_secret");
        env::set_var("CATALOG_REDIRECT_URI", "http://localhost/cb");
        env::set_var("IDENTITY_API_KEY", "identity_key");
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!!");
        env::set_var("OAUTH_STATE_KEY", "state_key");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.catalog_client_id, "test_id");
        assert_eq!(config.catalog_client_secret, "test_secret");
        assert_eq!(config.port, 8080);
    }
}
