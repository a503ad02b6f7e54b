use std::env::{self, VarError};
use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

const DEFAULT_ADDR: IpAddr = IpAddr::V6(Ipv6Addr::LOCALHOST);
const DEFAULT_PORT: u16 = 3000;

const DEFAULT_COOKIE_NAME: &str = "_rolo";

const DEFAULT_LOG_LEVEL: &str = "info";

/// The private cookie key must be usable for both encryption and signing,
/// which requires at least this many bytes of key material.
const MIN_KEY_LEN: usize = 64;

/// Errors while reading configuration from the environment.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("environment variable {0} is not valid unicode")]
    NotUnicode(&'static str),
    #[error("invalid listen address")]
    InvalidAddr,
    #[error("invalid listen port")]
    InvalidPort,
    #[error("session key is not valid base64")]
    KeyEncoding,
    #[error("session key must decode to at least {MIN_KEY_LEN} bytes")]
    KeyTooShort,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub postgres_url: String,
    pub provider_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    /// Overrides the JWKS url advertised by provider discovery.
    pub jwks_url: Option<String>,
    pub cookie: CookieConfig,
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct CookieConfig {
    /// Prefix for every cookie issued by the app.
    pub name: String,
    /// Decoded private-cookie key material, at least [`MIN_KEY_LEN`] bytes.
    pub key: Vec<u8>,
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// `POSTGRES_URL`, `OIDC_PROVIDER_URL`, `CLIENT_ID`, `CLIENT_SECRET`,
    /// `REDIRECT_URL`, and `SESSION_KEY` (base64) are required; `ADDR`,
    /// `PORT`, `JWKS_URL`, `COOKIE_NAME`, and `LOG_LEVEL` are optional.
    pub fn try_env() -> Result<Self, ConfigError> {
        let ip: IpAddr = match optional("ADDR") {
            Some(addr) => addr.parse().map_err(|_| ConfigError::InvalidAddr)?,
            None => DEFAULT_ADDR,
        };
        let port: u16 = match optional("PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidPort)?,
            None => DEFAULT_PORT,
        };

        Ok(Self {
            addr: SocketAddr::new(ip, port),
            postgres_url: require("POSTGRES_URL")?,
            provider_url: require("OIDC_PROVIDER_URL")?,
            client_id: require("CLIENT_ID")?,
            client_secret: require("CLIENT_SECRET")?,
            redirect_url: require("REDIRECT_URL")?,
            jwks_url: optional("JWKS_URL"),
            cookie: CookieConfig {
                name: optional("COOKIE_NAME").unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string()),
                key: decode_session_key(&require("SESSION_KEY")?)?,
            },
            log_level: optional("LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) | Err(VarError::NotPresent) => Err(ConfigError::MissingVar(name)),
        Err(VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(name)),
    }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

fn decode_session_key(encoded: &str) -> Result<Vec<u8>, ConfigError> {
    let key = STANDARD
        .decode(encoded)
        .map_err(|_| ConfigError::KeyEncoding)?;

    if key.len() < MIN_KEY_LEN {
        return Err(ConfigError::KeyTooShort);
    }

    Ok(key)
}
