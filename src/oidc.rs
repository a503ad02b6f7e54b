//! Helper functions for performing the OIDC flow.

use crate::config::Config;

use openidconnect::{
    core::{
        CoreAuthDisplay, CoreClaimName, CoreClaimType, CoreClient, CoreClientAuthMethod,
        CoreGrantType, CoreJsonWebKey, CoreJsonWebKeyType, CoreJsonWebKeyUse,
        CoreJweContentEncryptionAlgorithm, CoreJweKeyManagementAlgorithm, CoreJwsSigningAlgorithm,
        CoreResponseMode, CoreResponseType, CoreSubjectIdentifierType,
    },
    reqwest::async_http_client,
    AdditionalProviderMetadata, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce,
    ProviderMetadata, RedirectUrl,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Errors while setting up OIDC. These are fatal at boot; the app cannot
/// run without a reachable provider.
#[derive(Error, Clone, Debug)]
pub enum SetupError {
    #[error("invalid issuer url")]
    InvalidIssuer,
    #[error("invalid redirect url")]
    InvalidRedirect,
    #[error("error during OIDC discovery")]
    DiscoveryError,
    #[error("provider advertises no token endpoint")]
    MissingTokenEndpoint,
}

// The end-session endpoint is not part of the core metadata, so ask for it
// as additional discovery metadata. Providers that omit it are fine; logout
// then lands on the index page.
#[derive(Clone, Debug, Deserialize, Serialize)]
struct SessionEndpointProviderMetadata {
    #[serde(default)]
    end_session_endpoint: Option<String>,
}

impl AdditionalProviderMetadata for SessionEndpointProviderMetadata {}

/// A configured OIDC provider, produced once by discovery at startup.
#[derive(Clone, Debug)]
pub struct Provider {
    pub client: CoreClient,
    pub token_url: String,
    pub jwks_url: String,
    pub logout_url: Option<String>,
}

pub async fn setup(config: &Config) -> Result<Provider, SetupError> {
    let issuer_url = IssuerUrl::new(config.provider_url.clone()).map_err(|e| {
        error!("error setting up issuer url: {}", e);
        SetupError::InvalidIssuer
    })?;

    let provider_metadata = ProviderMetadata::<
        SessionEndpointProviderMetadata,
        CoreAuthDisplay,
        CoreClientAuthMethod,
        CoreClaimName,
        CoreClaimType,
        CoreGrantType,
        CoreJweContentEncryptionAlgorithm,
        CoreJweKeyManagementAlgorithm,
        CoreJwsSigningAlgorithm,
        CoreJsonWebKeyType,
        CoreJsonWebKeyUse,
        CoreJsonWebKey,
        CoreResponseMode,
        CoreResponseType,
        CoreSubjectIdentifierType,
    >::discover_async(issuer_url, async_http_client)
    .await
    .map_err(|e| {
        error!("failed OIDC discovery: {}", e);
        SetupError::DiscoveryError
    })?;

    let token_url = provider_metadata
        .token_endpoint()
        .map(|url| url.url().to_string())
        .ok_or(SetupError::MissingTokenEndpoint)?;

    let jwks_url = config
        .jwks_url
        .clone()
        .unwrap_or_else(|| provider_metadata.jwks_uri().url().to_string());

    let logout_url = provider_metadata
        .additional_metadata()
        .end_session_endpoint
        .clone();

    let client = CoreClient::from_provider_metadata(
        provider_metadata,
        ClientId::new(config.client_id.clone()),
        Some(ClientSecret::new(config.client_secret.clone())),
    )
    .set_redirect_uri(RedirectUrl::new(config.redirect_url.clone()).map_err(|e| {
        error!("invalid redirect url: {}", e);
        SetupError::InvalidRedirect
    })?);

    Ok(Provider {
        client,
        token_url,
        jwks_url,
        logout_url,
    })
}

/// In-flight login state carried in a private cookie between the login
/// redirect and the provider callback.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OidcState {
    csrf: String,
    nonce: String,
}

impl OidcState {
    pub fn new(csrf: &CsrfToken, nonce: &Nonce) -> Self {
        Self {
            csrf: csrf.secret().clone(),
            nonce: nonce.secret().clone(),
        }
    }

    /// Check the `state` query parameter echoed by the provider against
    /// the value stashed at login time.
    pub fn matches(&self, state: &str) -> bool {
        self.csrf == state
    }

    pub fn nonce(&self) -> Nonce {
        Nonce::new(self.nonce.clone())
    }
}
