mod callback;
mod contact;
mod index;
mod login;
mod logout;

use crate::auth::{require_auth, AuthState};
use crate::ServerState;

use axum::{
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
    Router,
};

pub fn routes(auth: AuthState) -> Router<ServerState> {
    let gated = Router::new()
        .route("/contact", get(contact::list_handler))
        .route(
            "/contact/:id",
            get(contact::row_handler).put(contact::update_handler),
        )
        .route("/contact/:id/edit", get(contact::edit_handler))
        .route_layer(from_fn_with_state(auth, require_auth));

    Router::new()
        .route("/", get(index::index_handler))
        .route("/login", get(login::login_handler))
        .route("/callback", get(callback::callback_handler))
        .route("/logout", get(logout::logout_handler))
        .route("/ping", get(ping_handler))
        .merge(gated)
}

#[axum::debug_handler(state = ServerState)]
async fn ping_handler() -> StatusCode {
    StatusCode::OK
}
