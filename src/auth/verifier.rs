//! Access-token verification against the provider's key set.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// An error that occurs while verifying an access token. None of these are
/// fatal; the request they belong to is simply denied.
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("malformed token header: {0}")]
    Header(jsonwebtoken::errors::Error),
    #[error("token does not name a signing key")]
    MissingKeyId,
    #[error("token algorithm {0:?} is not allowed")]
    UnsupportedAlgorithm(Algorithm),
    #[error("failed to fetch key set: {0}")]
    KeySetFetch(String),
    #[error("no key in the key set matches kid {0:?}")]
    UnknownKey(String),
    #[error("key material is unusable: {0}")]
    BadKey(jsonwebtoken::errors::Error),
    #[error("token rejected: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// Claims carried by a verified access token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessClaims {
    #[serde(default)]
    pub sub: Option<String>,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Verifies bearer tokens against the provider's JWKS.
///
/// The key set is fetched lazily and cached behind a read-mostly lock.
/// A fetch happens when the cache is empty or when a token names a key id
/// the cached set does not contain (key rotation); concurrent refreshes
/// are serialized by the write lock. Fetches are bounded to ten seconds
/// and a failed fetch denies only the current request.
#[derive(Clone)]
pub struct TokenVerifier {
    inner: Arc<Inner>,
}

struct Inner {
    jwks_url: String,
    http: reqwest::Client,
    algorithms: Vec<Algorithm>,
    keys: RwLock<Option<Arc<JwkSet>>>,
}

impl TokenVerifier {
    /// Create a verifier that accepts the usual asymmetric OIDC signing
    /// algorithms.
    pub fn new(jwks_url: &str, http: reqwest::Client) -> Self {
        Self::with_algorithms(jwks_url, http, vec![Algorithm::RS256, Algorithm::ES256])
    }

    /// Create a verifier restricted to an explicit algorithm allow-list.
    pub fn with_algorithms(
        jwks_url: &str,
        http: reqwest::Client,
        algorithms: Vec<Algorithm>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                jwks_url: jwks_url.to_string(),
                http,
                algorithms,
                keys: RwLock::new(None),
            }),
        }
    }

    /// Verify a token's signature and time-based claims.
    ///
    /// Verification is a pure decision over the token, the cached key set,
    /// and the clock; no per-token state is kept, so verifying the same
    /// token twice yields the same answer.
    pub async fn verify(&self, token: &str) -> Result<AccessClaims, VerifyError> {
        let header = decode_header(token).map_err(VerifyError::Header)?;

        if !self.inner.algorithms.contains(&header.alg) {
            return Err(VerifyError::UnsupportedAlgorithm(header.alg));
        }
        let kid = header.kid.ok_or(VerifyError::MissingKeyId)?;

        let jwk = match self.find_key(&kid).await {
            Some(jwk) => jwk,
            None => {
                self.refresh_keys().await?;
                self.find_key(&kid)
                    .await
                    .ok_or_else(|| VerifyError::UnknownKey(kid.clone()))?
            }
        };

        let key = DecodingKey::from_jwk(&jwk).map_err(VerifyError::BadKey)?;
        let mut validation = Validation::new(header.alg);
        validation.validate_nbf = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        decode::<AccessClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(VerifyError::Invalid)
    }

    async fn find_key(&self, kid: &str) -> Option<Jwk> {
        let keys = self.inner.keys.read().await;

        keys.as_ref().and_then(|set| set.find(kid)).cloned()
    }

    async fn refresh_keys(&self) -> Result<(), VerifyError> {
        let mut keys = self.inner.keys.write().await;

        let set = fetch_keys(&self.inner.http, &self.inner.jwks_url)
            .await
            .map_err(|e| {
                error!("failed to fetch key set from {}: {}", self.inner.jwks_url, e);
                e
            })?;

        debug!("cached {} keys from {}", set.keys.len(), self.inner.jwks_url);
        *keys = Some(Arc::new(set));

        Ok(())
    }
}

async fn fetch_keys(http: &reqwest::Client, url: &str) -> Result<JwkSet, VerifyError> {
    let response = http
        .get(url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| VerifyError::KeySetFetch(e.to_string()))?;

    response
        .json()
        .await
        .map_err(|e| VerifyError::KeySetFetch(e.to_string()))
}
