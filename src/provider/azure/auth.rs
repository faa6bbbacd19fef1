//! # Azure Authentication
//!
//! Obtains Resource Manager access tokens with the OAuth2 client-credentials
//! grant and caches them until shortly before they expire.

use super::credentials::AzureCredentials;
use crate::constants::TOKEN_EXPIRY_SKEW_SECS;
use crate::provider::AzureError;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<ExpiresIn>,
}

// v1 endpoints return expires_in as a string, v2 as a number
#[derive(Deserialize)]
#[serde(untagged)]
enum ExpiresIn {
    Seconds(u64),
    Text(String),
}

impl ExpiresIn {
    fn as_secs(&self) -> u64 {
        match self {
            ExpiresIn::Seconds(secs) => *secs,
            ExpiresIn::Text(text) => text.parse().unwrap_or(0),
        }
    }
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Client-credentials token source for one service principal
pub struct TokenSource {
    credentials: AzureCredentials,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("client_id", &self.credentials.client_id)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    pub fn new(credentials: AzureCredentials) -> Self {
        Self {
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Get a bearer token, fetching a new one when the cached token is about to expire
    pub async fn bearer_token(&self, http: &ReqwestClient) -> Result<String, AzureError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        debug!(
            client_id = %self.credentials.client_id,
            "Requesting Azure Resource Manager access token"
        );

        let scope = self.credentials.token_scope();
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = http
            .post(self.credentials.token_url())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AzureError::Token(format!("HTTP {status} - {error_text}")));
        }

        let body = response.bytes().await?;
        let token: TokenResponse = serde_json::from_slice(&body).map_err(AzureError::Decode)?;

        let lifetime = token.expires_in.as_ref().map_or(0, ExpiresIn::as_secs);
        let expires_at =
            Instant::now() + Duration::from_secs(lifetime.saturating_sub(TOKEN_EXPIRY_SKEW_SECS));

        let bearer = token.access_token.clone();
        *cached = Some(CachedToken {
            token: token.access_token,
            expires_at,
        });

        Ok(bearer)
    }
}
