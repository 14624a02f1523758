//! OAuth2 client-credentials token cache
//!
//! Readers share a `RwLock` over the cached token. Refreshes are serialized by
//! a separate mutex and re-check the cache after acquiring it, so a burst of
//! callers hitting an expired token produces a single token request.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use super::error::PlatformError;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    /// `None` when `expires_in` lies beyond what `Instant` can represent
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_usable(&self, buffer: Duration) -> bool {
        let Some(expires_at) = self.expires_at else {
            return true;
        };
        // A buffer too large to add is treated as "always inside the buffer"
        Instant::now()
            .checked_add(buffer)
            .is_some_and(|deadline| deadline < expires_at)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: String,
    expires_in: u64,
}

/// Client credentials for the platform auth endpoint
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    credentials: ClientCredentials,
    refresh_buffer: Duration,
    cached: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        token_url: impl Into<String>,
        credentials: ClientCredentials,
        refresh_buffer: Duration,
    ) -> Self {
        Self {
            http,
            token_url: token_url.into(),
            credentials,
            refresh_buffer,
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return a bearer token that stays valid for at least the refresh buffer,
    /// fetching a new one if needed.
    pub async fn ensure_valid_token(&self) -> Result<String, PlatformError> {
        if let Some(token) = self.usable_token().await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited
        if let Some(token) = self.usable_token().await {
            return Ok(token);
        }

        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *self.cached.write().await = Some(fresh);
        Ok(value)
    }

    /// Drop the cached token if it is still the one the platform rejected.
    pub async fn invalidate(&self, rejected: &str) {
        let mut cached = self.cached.write().await;
        if cached.as_ref().is_some_and(|t| t.value == rejected) {
            tracing::warn!("Platform rejected cached access token, forcing refresh");
            *cached = None;
        }
    }

    async fn usable_token(&self) -> Option<String> {
        self.cached
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_usable(self.refresh_buffer))
            .map(|t| t.value.clone())
    }

    async fn request_token(&self) -> Result<CachedToken, PlatformError> {
        let requested_at = Instant::now();
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PlatformError::Auth(format!("token request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlatformError::Auth(format!("status {status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PlatformError::Auth(format!("invalid token response: {e}")))?;

        tracing::info!(
            token_type = %token.token_type,
            expires_in = token.expires_in,
            "Platform access token refreshed"
        );

        Ok(CachedToken {
            value: token.access_token,
            expires_at: requested_at.checked_add(Duration::from_secs(token.expires_in)),
        })
    }
}
