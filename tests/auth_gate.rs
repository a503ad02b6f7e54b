//! End-to-end tests for the session gate.
//!
//! Each test drives a tiny router whose only protected route echoes the
//! verified subject claim, with a mock provider (JWKS + token endpoint)
//! listening on an ephemeral port. Test tokens are HS256 over an `oct`
//! key so nothing leaves the process.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::Form;
use axum::http::{header, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use time::OffsetDateTime;
use tower::ServiceExt;
use tower_cookies::cookie::{Cookie, CookieJar};
use tower_cookies::{CookieManagerLayer, Key};

use rolo::auth::{require_auth, AccessClaims, AuthState, TokenRefresher, TokenVerifier};
use rolo::session::{Session, UserProfile};

const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";
const KID: &str = "primary";

fn cookie_key() -> Key {
    Key::from(&[0x42u8; 64])
}

fn sign_token(kid: &str, sub: &str, exp: i64) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    let claims = json!({ "sub": sub, "exp": exp });

    encode(&header, &claims, &EncodingKey::from_secret(SECRET)).expect("sign token")
}

fn in_an_hour() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp() + 3600
}

fn an_hour_ago() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp() - 3600
}

fn session(access_token: &str, refresh_token: Option<&str>) -> Session {
    Session {
        access_token: access_token.to_string(),
        refresh_token: refresh_token.map(str::to_string),
        profile: UserProfile {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
        },
    }
}

/// Encrypt a session the way the callback handler would, returning a
/// ready-to-send Cookie header value.
fn session_cookie(auth: &AuthState, session: &Session) -> String {
    let mut jar = CookieJar::new();
    jar.private_mut(auth.cookie_key()).add(Cookie::new(
        auth.session_cookie().to_string(),
        serde_json::to_string(session).expect("encode session"),
    ));
    let cookie = jar.get(auth.session_cookie()).expect("encrypted cookie");

    format!("{}={}", cookie.name(), cookie.value())
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("listener addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    addr
}

/// A mock provider serving the JWKS and a token endpoint that counts
/// refresh attempts. `refreshed` of `None` makes every refresh fail with
/// a 400.
async fn spawn_provider(refreshed: Option<String>, refresh_hits: Arc<AtomicUsize>) -> SocketAddr {
    let jwks = json!({
        "keys": [{ "kty": "oct", "kid": KID, "k": URL_SAFE_NO_PAD.encode(SECRET) }]
    });

    let app = Router::new()
        .route(
            "/jwks.json",
            get(move || {
                let jwks = jwks.clone();
                async move { Json(jwks) }
            }),
        )
        .route(
            "/oauth/token",
            post(move |Form(params): Form<HashMap<String, String>>| {
                let refreshed = refreshed.clone();
                let refresh_hits = refresh_hits.clone();
                async move {
                    refresh_hits.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(
                        params.get("grant_type").map(String::as_str),
                        Some("refresh_token")
                    );

                    match refreshed {
                        Some(token) => Json(
                            json!({ "access_token": token, "refresh_token": "rotated" }),
                        )
                        .into_response(),
                        None => (
                            StatusCode::BAD_REQUEST,
                            Json(json!({ "error": "invalid_grant" })),
                        )
                            .into_response(),
                    }
                }
            }),
        );

    spawn(app).await
}

fn auth_state(provider: SocketAddr) -> AuthState {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .expect("build http client");

    AuthState::new(
        cookie_key(),
        "_rolo",
        TokenVerifier::with_algorithms(
            &format!("http://{provider}/jwks.json"),
            http.clone(),
            vec![Algorithm::HS256],
        ),
        TokenRefresher::new(
            &format!("http://{provider}/oauth/token"),
            "client-id",
            "client-secret",
            http,
        ),
    )
}

/// The protected handler echoes the verified subject and counts its
/// invocations, so tests can assert both outcomes and non-invocation.
fn gated_app(auth: AuthState, handler_hits: Arc<AtomicUsize>) -> Router {
    Router::new()
        .route(
            "/contact",
            get(move |Extension(claims): Extension<AccessClaims>| {
                let handler_hits = handler_hits.clone();
                async move {
                    handler_hits.fetch_add(1, Ordering::SeqCst);
                    claims.sub.unwrap_or_default()
                }
            }),
        )
        .route_layer(from_fn_with_state(auth, require_auth))
        .layer(CookieManagerLayer::new())
}

fn request(cookie: Option<&str>) -> Request<Body> {
    let builder = Request::builder().uri("/contact");
    let builder = match cookie {
        Some(cookie) => builder.header(header::COOKIE, cookie),
        None => builder,
    };

    builder.body(Body::empty()).expect("build request")
}

fn location(response: &axum::response::Response) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn no_cookie_redirects_to_login() {
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let provider = spawn_provider(None, refresh_hits).await;
    let app = gated_app(auth_state(provider), handler_hits.clone());

    let response = app.oneshot(request(None)).await.expect("send request");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn garbage_cookie_redirects_to_login() {
    let provider = spawn_provider(None, Arc::new(AtomicUsize::new(0))).await;
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = gated_app(auth_state(provider), handler_hits.clone());

    let response = app
        .oneshot(request(Some("_rolo_session=not-an-encrypted-cookie")))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn misshapen_session_redirects_to_login() {
    let provider = spawn_provider(None, Arc::new(AtomicUsize::new(0))).await;
    let auth = auth_state(provider);
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = gated_app(auth.clone(), handler_hits.clone());

    // Encrypted under the right key, but not a session payload.
    let mut jar = CookieJar::new();
    jar.private_mut(auth.cookie_key()).add(Cookie::new(
        auth.session_cookie().to_string(),
        r#"{"hello":"world"}"#,
    ));
    let cookie = jar.get(auth.session_cookie()).expect("encrypted cookie");
    let header_value = format!("{}={}", cookie.name(), cookie.value());

    let response = app
        .oneshot(request(Some(&header_value)))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_access_token_gets_401() {
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let provider = spawn_provider(None, refresh_hits.clone()).await;
    let auth = auth_state(provider);
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = gated_app(auth.clone(), handler_hits.clone());

    let cookie = session_cookie(&auth, &session("", Some("refresh-1")));
    let response = app
        .oneshot(request(Some(&cookie)))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0);
    // No verification, no refresh.
    assert_eq!(refresh_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_token_invokes_handler() {
    let provider = spawn_provider(None, Arc::new(AtomicUsize::new(0))).await;
    let auth = auth_state(provider);
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = gated_app(auth.clone(), handler_hits.clone());

    let token = sign_token(KID, "user-1", in_an_hour());
    let cookie = session_cookie(&auth, &session(&token, None));
    let response = app
        .oneshot(request(Some(&cookie)))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.expect("read body");
    assert_eq!(body.to_bytes().as_ref(), b"user-1");
    assert_eq!(handler_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn same_session_is_accepted_repeatedly() {
    let provider = spawn_provider(None, Arc::new(AtomicUsize::new(0))).await;
    let auth = auth_state(provider);
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = gated_app(auth.clone(), handler_hits.clone());

    let token = sign_token(KID, "user-1", in_an_hour());
    let cookie = session_cookie(&auth, &session(&token, None));

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request(Some(&cookie)))
            .await
            .expect("send request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(handler_hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unknown_key_is_rejected() {
    let provider = spawn_provider(None, Arc::new(AtomicUsize::new(0))).await;
    let auth = auth_state(provider);
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = gated_app(auth.clone(), handler_hits.clone());

    let token = sign_token("retired", "user-1", in_an_hour());
    let cookie = session_cookie(&auth, &session(&token, None));
    let response = app
        .oneshot(request(Some(&cookie)))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_once() {
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let new_token = sign_token(KID, "user-2", in_an_hour());
    let provider = spawn_provider(Some(new_token), refresh_hits.clone()).await;
    let auth = auth_state(provider);
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = gated_app(auth.clone(), handler_hits.clone());

    let stale = sign_token(KID, "user-1", an_hour_ago());
    let cookie = session_cookie(&auth, &session(&stale, Some("refresh-1")));
    let response = app
        .oneshot(request(Some(&cookie)))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::OK);
    // The handler sees the refreshed token's claims.
    let body = response.into_body().collect().await.expect("read body");
    assert_eq!(body.to_bytes().as_ref(), b"user-2");
    assert_eq!(refresh_hits.load(Ordering::SeqCst), 1);
    assert_eq!(handler_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_refresh_redirects_to_login() {
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let provider = spawn_provider(None, refresh_hits.clone()).await;
    let auth = auth_state(provider);
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = gated_app(auth.clone(), handler_hits.clone());

    let stale = sign_token(KID, "user-1", an_hour_ago());
    let cookie = session_cookie(&auth, &session(&stale, Some("refresh-1")));
    let response = app
        .oneshot(request(Some(&cookie)))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(refresh_hits.load(Ordering::SeqCst), 1);
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_token_without_refresh_token_redirects() {
    let refresh_hits = Arc::new(AtomicUsize::new(0));
    let provider = spawn_provider(None, refresh_hits.clone()).await;
    let auth = auth_state(provider);
    let handler_hits = Arc::new(AtomicUsize::new(0));
    let app = gated_app(auth.clone(), handler_hits.clone());

    let stale = sign_token(KID, "user-1", an_hour_ago());
    let cookie = session_cookie(&auth, &session(&stale, Some("")));
    let response = app
        .oneshot(request(Some(&cookie)))
        .await
        .expect("send request");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), Some("/login"));
    assert_eq!(refresh_hits.load(Ordering::SeqCst), 0);
    assert_eq!(handler_hits.load(Ordering::SeqCst), 0);
}
