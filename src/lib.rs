//! # rolo
//!
//! rolo is a small server-rendered contact manager behind an OpenID
//! Connect login.
//!
//! ## About
//!
//! Users sign in with an OIDC provider through the authorization code
//! flow. The callback stores the issued tokens and a small profile in a
//! private session cookie, and the contact pages are gated by middleware
//! that verifies the access token against the provider's published key
//! set, falling back to a single refresh-token exchange when the token
//! has gone stale. Contacts live in a `people` table in Postgres and are
//! rendered server-side.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod oidc;
mod pages;
mod routes;
pub mod session;
pub mod shutdown;

pub use routes::routes;

use std::sync::Arc;

#[derive(Clone)]
pub struct ServerState {
    pub config: crate::config::Config,
    pub db: Arc<tokio_postgres::Client>,
    pub oidc: crate::oidc::Provider,
    pub auth: crate::auth::AuthState,
}
