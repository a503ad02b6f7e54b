//! Session gating for the contact pages.
//!
//! The gate is middleware layered ahead of the protected routes. It reads
//! the session cookie, verifies the access token against the provider's
//! key set, and falls back to a single refresh-token exchange when the
//! token no longer verifies. It keeps no state of its own; every request
//! is decided independently.

pub mod refresh;
pub mod verifier;

pub use refresh::{RefreshError, RefreshedTokens, TokenRefresher};
pub use verifier::{AccessClaims, TokenVerifier, VerifyError};

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;
use tower_cookies::{Cookies, Key};
use tracing::{debug, warn};

use crate::session::{Session, SessionError};

/// An error that denies a request at the gate. Nothing here is fatal and
/// no detail reaches the client; the user is sent back to `/login` (or
/// given a bare 401 when the session carried no token at all).
#[derive(Error, Debug)]
pub enum GateError {
    #[error("session unavailable")]
    SessionUnavailable,
    #[error("session cookie failed to decode")]
    SessionDecode,
    #[error("access token missing")]
    TokenMissing,
    #[error("invalid access token: {0}")]
    TokenInvalid(#[from] VerifyError),
    #[error("token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        match self {
            GateError::TokenMissing => StatusCode::UNAUTHORIZED.into_response(),
            _ => Redirect::to("/login").into_response(),
        }
    }
}

/// Everything the gate needs to decide a request, built once at startup
/// and shared by the login/callback/logout handlers for cookie access.
#[derive(Clone)]
pub struct AuthState {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    key: Key,
    session_cookie: String,
    oidc_cookie: String,
    verifier: TokenVerifier,
    refresher: TokenRefresher,
}

impl AuthState {
    pub fn new(
        key: Key,
        cookie_prefix: &str,
        verifier: TokenVerifier,
        refresher: TokenRefresher,
    ) -> Self {
        Self {
            inner: Arc::new(AuthInner {
                key,
                session_cookie: format!("{cookie_prefix}_session"),
                oidc_cookie: format!("{cookie_prefix}_oidc"),
                verifier,
                refresher,
            }),
        }
    }

    /// The key for the private cookie jar.
    pub fn cookie_key(&self) -> &Key {
        &self.inner.key
    }

    /// Name of the session cookie.
    pub fn session_cookie(&self) -> &str {
        &self.inner.session_cookie
    }

    /// Name of the short-lived cookie holding in-flight login state.
    pub fn oidc_cookie(&self) -> &str {
        &self.inner.oidc_cookie
    }
}

/// Middleware guarding the contact routes.
///
/// On success the verified token's claims are inserted into the request's
/// extensions for the wrapped handler.
pub async fn require_auth(
    State(auth): State<AuthState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let claims = authenticate(&auth, &cookies).await?;
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

async fn authenticate(auth: &AuthState, cookies: &Cookies) -> Result<AccessClaims, GateError> {
    let session = Session::read(cookies, &auth.inner.key, &auth.inner.session_cookie).map_err(
        |e| match e {
            SessionError::Missing => {
                debug!("no session cookie");
                GateError::SessionUnavailable
            }
            SessionError::Decode(e) => {
                warn!("session cookie failed to decode: {}", e);
                GateError::SessionDecode
            }
        },
    )?;

    if session.access_token.is_empty() {
        return Err(GateError::TokenMissing);
    }

    let failure = match auth.inner.verifier.verify(&session.access_token).await {
        Ok(claims) => return Ok(claims),
        Err(e) => e,
    };

    // One refresh attempt, then re-verify the new token. Any failure on
    // this path sends the user back through login.
    let refresh_token = match session.refresh_token.as_deref() {
        Some(token) if !token.is_empty() => token,
        _ => return Err(GateError::TokenInvalid(failure)),
    };

    warn!("access token rejected ({}), attempting refresh", failure);
    let tokens = auth.inner.refresher.refresh(refresh_token).await?;

    Ok(auth.inner.verifier.verify(&tokens.access_token).await?)
}
