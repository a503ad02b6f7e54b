//! Session logout.

use crate::session::Session;
use crate::ServerState;

use axum::{extract::State, response::Redirect};
use tower_cookies::Cookies;
use tracing::info;

/// Expires the session cookie and sends the user to the provider's
/// end-session endpoint when discovery advertised one.
#[axum::debug_handler(state = ServerState)]
pub async fn logout_handler(State(state): State<ServerState>, cookies: Cookies) -> Redirect {
    Session::clear(&cookies, state.auth.session_cookie());
    info!("session cleared");

    match state.oidc.logout_url.as_deref() {
        Some(url) => Redirect::to(url),
        None => Redirect::to("/"),
    }
}
