//! Refresh-token exchange with the provider's token endpoint.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

/// An error that occurs during a refresh attempt. The caller makes no
/// further attempts; these all fall back to a fresh login.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error("token endpoint request failed: {0}")]
    Request(String),
    #[error("token endpoint returned {0}")]
    Status(reqwest::StatusCode),
    #[error("token endpoint response was unparsable: {0}")]
    Parse(String),
}

/// Tokens returned by a successful refresh. The provider may rotate the
/// refresh token; when it does not, the caller keeps using the old one.
#[derive(Clone, Debug, Deserialize)]
pub struct RefreshedTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Exchanges refresh tokens for new access tokens.
#[derive(Clone, Debug)]
pub struct TokenRefresher {
    token_url: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl TokenRefresher {
    pub fn new(token_url: &str, client_id: &str, client_secret: &str, http: reqwest::Client) -> Self {
        Self {
            token_url: token_url.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            http,
        }
    }

    /// Perform a single `grant_type=refresh_token` exchange.
    ///
    /// Success requires HTTP 200 and a JSON body carrying a non-empty
    /// `access_token`. Anything else fails this attempt; there is no retry.
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .timeout(REFRESH_TIMEOUT)
            .form(&params)
            .send()
            .await
            .map_err(|e| RefreshError::Request(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            debug!("token endpoint refused refresh with {}", status);
            return Err(RefreshError::Status(status));
        }

        let tokens: RefreshedTokens = response
            .json()
            .await
            .map_err(|e| RefreshError::Parse(e.to_string()))?;

        if tokens.access_token.is_empty() {
            return Err(RefreshError::Parse("empty access_token".to_string()));
        }

        Ok(tokens)
    }
}
