//! A route for handling the OIDC callback.

use std::collections::HashMap;

use crate::error::HttpError;
use crate::oidc::OidcState;
use crate::session::{Session, UserProfile};
use crate::ServerState;

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use openidconnect::{reqwest::async_http_client, AuthorizationCode, OAuth2TokenResponse, TokenResponse};
use tower_cookies::{Cookie, Cookies};
use tracing::error;

/// Finishes the authorization-code flow: check the echoed state against
/// the CSRF cookie, exchange the code, verify the ID token against the
/// stashed nonce, and write the session.
#[axum::debug_handler(state = ServerState)]
pub async fn callback_handler(
    State(state): State<ServerState>,
    cookies: Cookies,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Redirect, HttpError> {
    let code = params
        .get("code")
        .ok_or(HttpError::BadRequest("No code parameter provided"))?;
    let state_param = params
        .get("state")
        .ok_or(HttpError::BadRequest("No state parameter provided"))?;

    let cookie = cookies
        .private(state.auth.cookie_key())
        .get(state.auth.oidc_cookie())
        .ok_or(HttpError::BadRequest("Missing login state cookie"))?;

    let oidc: OidcState = serde_json::from_str(cookie.value()).map_err(|e| {
        error!("failed to restore login state: {}", e);
        HttpError::BadRequest("CSRF checking failed")
    })?;

    if !oidc.matches(state_param) {
        return Err(HttpError::BadRequest("CSRF checking failed"));
    }

    let token_response = state
        .oidc
        .client
        .exchange_code(AuthorizationCode::new(code.clone()))
        .request_async(async_http_client)
        .await
        .map_err(|e| {
            error!("failed to exchange authorization code: {}", e);
            HttpError::Internal("Failed to exchange token")
        })?;

    let id_token = token_response.id_token().ok_or_else(|| {
        error!("token response contained no id token");
        HttpError::Internal("Failed to get id token")
    })?;

    let claims = id_token
        .claims(&state.oidc.client.id_token_verifier(), &oidc.nonce())
        .map_err(|e| {
            error!("failed to verify id token: {}", e);
            HttpError::Internal("Failed to verify id token")
        })?;

    let profile = UserProfile {
        name: claims
            .name()
            .and_then(|name| name.get(None))
            .map(|name| name.as_str().to_string())
            .unwrap_or_default(),
        email: claims
            .email()
            .map(|email| email.as_str().to_string())
            .unwrap_or_default(),
    };

    let session = Session {
        access_token: token_response.access_token().secret().clone(),
        refresh_token: token_response
            .refresh_token()
            .map(|token| token.secret().clone()),
        profile,
    };

    session
        .write(&cookies, state.auth.cookie_key(), state.auth.session_cookie())
        .map_err(|e| {
            error!("failed to write session cookie: {}", e);
            HttpError::Internal("Failed to save session")
        })?;

    // The login state cookie is single-use.
    cookies.remove(
        Cookie::build((state.auth.oidc_cookie().to_string(), ""))
            .path("/")
            .build(),
    );

    Ok(Redirect::temporary("/contact"))
}
