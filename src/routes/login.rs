//! The login redirect.

use crate::error::HttpError;
use crate::oidc::OidcState;
use crate::ServerState;

use axum::{extract::State, response::Redirect};
use openidconnect::{core::CoreAuthenticationFlow, CsrfToken, Nonce, Scope};
use time::Duration;
use tower_cookies::{Cookie, Cookies};
use tracing::error;

/// Logins not completed within this window start over.
const LOGIN_TTL: Duration = Duration::minutes(10);

/// Starts the authorization-code flow: stash CSRF state and nonce in a
/// private cookie and send the user to the provider's authorize URL.
#[axum::debug_handler(state = ServerState)]
pub async fn login_handler(
    State(state): State<ServerState>,
    cookies: Cookies,
) -> Result<Redirect, HttpError> {
    let (authorize_url, csrf, nonce) = state
        .oidc
        .client
        .authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            CsrfToken::new_random,
            Nonce::new_random,
        )
        .add_scope(Scope::new("profile".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .url();

    let value = serde_json::to_string(&OidcState::new(&csrf, &nonce)).map_err(|e| {
        error!("failed to encode login state: {}", e);
        HttpError::Internal("Failed to generate login request")
    })?;

    cookies.private(state.auth.cookie_key()).add(
        Cookie::build((state.auth.oidc_cookie().to_string(), value))
            .path("/")
            .secure(true)
            .http_only(true)
            .max_age(LOGIN_TTL)
            .build(),
    );

    Ok(Redirect::temporary(authorize_url.as_str()))
}
