//! Bearer token management.
//!
//! The client authenticates with short-lived access tokens obtained by
//! exchanging a long-lived refresh token at the identity service. Tokens are
//! refreshed lazily when older than the refresh interval.

use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::error::{Error, Result};

const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

#[derive(Default)]
struct TokenState {
    access_token: String,
    last_refresh: Option<Instant>,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
}

/// Lazily refreshing access token manager.
///
/// The token state is guarded by an async mutex held across the refresh call,
/// so concurrent callers observing a stale token trigger a single refresh.
pub struct TokenManager {
    http: reqwest::Client,
    identity_url: reqwest::Url,
    refresh_token: String,
    refresh_interval: Duration,
    state: Mutex<TokenState>,
}

impl TokenManager {
    /// Create a token manager exchanging `refresh_token` at `identity_url`.
    pub fn new(http: reqwest::Client, identity_url: reqwest::Url, refresh_token: String) -> Self {
        Self {
            http,
            identity_url,
            refresh_token,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Override the refresh interval. Useful in tests exercising staleness.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Get an `Authorization` header value with a fresh access token,
    /// refreshing first if the cached token is stale.
    pub async fn bearer(&self) -> Result<String> {
        let mut state = self.state.lock().await;
        let stale = match state.last_refresh {
            Some(at) => at.elapsed() >= self.refresh_interval,
            None => true,
        };
        if stale {
            state.access_token = self.refresh().await?;
            state.last_refresh = Some(Instant::now());
        }
        Ok(format!("Bearer {}", state.access_token))
    }

    async fn refresh(&self) -> Result<String> {
        tracing::debug!(url = %self.identity_url, "refreshing access token");
        let response = self
            .http
            .post(self.identity_url.clone())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", self.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Auth(format!(
                "token refresh failed, status_code={}",
                status.as_u16()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed token response: {e}")))?;
        Ok(body.id_token)
    }
}
