//! The private session cookie.
//!
//! The whole session lives client-side in one encrypted, signed cookie.
//! It is written once by the OIDC callback, read by the auth gate and the
//! index page, and destroyed at logout. The payload is a typed record, so
//! a cookie that decrypts but does not match the expected shape is a
//! decode error rather than a silently absent session.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Duration;
use tower_cookies::{Cookie, Cookies, Key};

/// How long a session cookie outlives its last issue. Access tokens go
/// stale much sooner; the gate's refresh path covers the difference.
const SESSION_TTL: Duration = Duration::days(30);

/// An error that occurs while reading or writing the session cookie.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no session cookie")]
    Missing,
    #[error("session cookie failed to decode: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Basic identity claims captured from the ID token at login.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
}

/// The session payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub profile: UserProfile,
}

impl Session {
    /// Read and decode the session from the request's private cookie jar.
    ///
    /// A cookie that fails decryption or signature checking is
    /// indistinguishable from an absent one and reported as
    /// [`SessionError::Missing`].
    pub fn read(cookies: &Cookies, key: &Key, name: &str) -> Result<Self, SessionError> {
        let cookie = cookies
            .private(key)
            .get(name)
            .ok_or(SessionError::Missing)?;

        Ok(serde_json::from_str(cookie.value())?)
    }

    /// Encrypt the session and add it to the response's cookie jar.
    pub fn write(&self, cookies: &Cookies, key: &Key, name: &str) -> Result<(), SessionError> {
        let value = serde_json::to_string(self)?;

        cookies.private(key).add(
            Cookie::build((name.to_string(), value))
                .path("/")
                .secure(true)
                .http_only(true)
                .max_age(SESSION_TTL)
                .build(),
        );

        Ok(())
    }

    /// Invalidate the session by expiring the cookie.
    pub fn clear(cookies: &Cookies, name: &str) {
        let mut cookie = Cookie::new(name.to_string(), "");
        cookie.set_path("/");
        cookies.remove(cookie);
    }
}
