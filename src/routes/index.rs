//! The landing page.

use crate::pages;
use crate::session::Session;
use crate::ServerState;

use axum::extract::State;
use maud::Markup;
use tower_cookies::Cookies;

/// Renders the index page, greeting the user when a session is present.
/// The page itself is public; a broken or absent session just renders the
/// signed-out variant.
#[axum::debug_handler(state = ServerState)]
pub async fn index_handler(State(state): State<ServerState>, cookies: Cookies) -> Markup {
    let profile = Session::read(&cookies, state.auth.cookie_key(), state.auth.session_cookie())
        .ok()
        .map(|session| session.profile);

    pages::index(profile.as_ref())
}
