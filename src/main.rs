//! rolo is a small server-rendered contact manager behind an OpenID
//! Connect login.
//!
//! Startup is the only fatal path: configuration, the database
//! connection, and provider discovery must all succeed before the
//! listener binds. Everything after that is recovered per request.

use std::env::var;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rolo::auth::{AuthState, TokenRefresher, TokenVerifier};
use rolo::config::Config;
use rolo::{oidc, routes, shutdown, ServerState};

use tokio_postgres::NoTls;
use tower::ServiceBuilder;
use tower_cookies::{CookieManagerLayer, Key};
use tower_http::{
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
    LatencyUnit,
};
use tracing::{error, info, Level};

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::try_env().context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone()))
        .init();

    let (db, connection) = tokio_postgres::connect(&config.postgres_url, NoTls)
        .await
        .context("failed to connect to postgres")?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("database connection error: {}", e);
        }
    });

    let provider = oidc::setup(&config).await.context("OIDC setup failed")?;

    let http = reqwest::Client::builder()
        .timeout(OUTBOUND_TIMEOUT)
        .build()
        .context("failed to build http client")?;

    let auth = AuthState::new(
        Key::from(&config.cookie.key),
        &config.cookie.name,
        TokenVerifier::new(&provider.jwks_url, http.clone()),
        TokenRefresher::new(
            &provider.token_url,
            &config.client_id,
            &config.client_secret,
            http,
        ),
    );

    let state = ServerState {
        config: config.clone(),
        db: Arc::new(db),
        oidc: provider,
        auth: auth.clone(),
    };

    let app = routes(auth).with_state(state).layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .on_request(DefaultOnRequest::new().level(Level::INFO))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(LatencyUnit::Micros),
                    ),
            )
            .layer(CookieManagerLayer::new()),
    );

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .context("failed to bind listener")?;
    info!("serving on {}", config.addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for_signal())
        .await
        .context("server unexpectedly stopped")?;

    Ok(())
}
