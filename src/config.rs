// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`GatewayConfig`] loaded from
//! them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `UPSTREAM_URL` | Base URL of the internal backend | Required |
//! | `UPSTREAM_TIMEOUT_SECS` | Timeout for forwarded requests | `30` |
//! | `JWT_SECRET` | HS256 signing secret (≥ 32 bytes) | Required |
//! | `JWT_TTL_SECS` | Token lifetime | `86400` |
//! | `PUBLIC_ROUTES` | Comma-separated `[METHOD] /pattern` allow-list | `/api/auth/**,GET /api/city` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; HTTPS when both are set | unset |
//! | `SEED_ADMIN_EMAIL` / `SEED_ADMIN_PASSWORD` | Bootstrap admin credential | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::auth::policy::{parse_route_list, PolicyError, RouteSpec};
use crate::auth::token::{DEFAULT_TOKEN_TTL, MIN_SECRET_LEN};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const UPSTREAM_URL_ENV: &str = "UPSTREAM_URL";
pub const UPSTREAM_TIMEOUT_ENV: &str = "UPSTREAM_TIMEOUT_SECS";
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_TTL_ENV: &str = "JWT_TTL_SECS";
pub const PUBLIC_ROUTES_ENV: &str = "PUBLIC_ROUTES";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Sign-up/sign-in and the public city listing.
pub const DEFAULT_PUBLIC_ROUTES: &str = "/api/auth/**,GET /api/city";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("JWT_SECRET must be at least 32 bytes")]
    WeakSecret,

    #[error("PUBLIC_ROUTES is invalid: {0}")]
    Routes(#[from] PolicyError),
}

/// PEM certificate chain and private key for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Bootstrap admin credential.
#[derive(Clone, PartialEq, Eq)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Gateway configuration.
#[derive(Clone)]
pub struct GatewayConfig {
    pub bind: SocketAddr,
    pub upstream_url: Url,
    pub upstream_timeout: Duration,
    pub jwt_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub public_routes: Vec<RouteSpec>,
    pub tls: Option<TlsPaths>,
    pub seed_admin: Option<SeedAdmin>,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind", &self.bind)
            .field("upstream_url", &self.upstream_url.as_str())
            .field("upstream_timeout", &self.upstream_timeout)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("public_routes", &self.public_routes.len())
            .field("tls", &self.tls)
            .field("seed_admin", &self.seed_admin)
            .finish()
    }
}

impl GatewayConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host: IpAddr = parse_or(get(HOST_ENV), HOST_ENV, DEFAULT_HOST.parse().ok())?;
        let port: u16 = parse_or(get(PORT_ENV), PORT_ENV, Some(DEFAULT_PORT))?;

        let upstream_raw = get(UPSTREAM_URL_ENV).ok_or(ConfigError::Missing(UPSTREAM_URL_ENV))?;
        let upstream_url = Url::parse(&upstream_raw).map_err(|e| ConfigError::Invalid {
            name: UPSTREAM_URL_ENV,
            reason: e.to_string(),
        })?;
        if !matches!(upstream_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: UPSTREAM_URL_ENV,
                reason: format!("unsupported scheme {}", upstream_url.scheme()),
            });
        }

        let upstream_timeout = parse_or(get(UPSTREAM_TIMEOUT_ENV), UPSTREAM_TIMEOUT_ENV, Some(DEFAULT_UPSTREAM_TIMEOUT.as_secs()))
            .map(Duration::from_secs)?;

        let jwt_secret = get(JWT_SECRET_ENV)
            .ok_or(ConfigError::Missing(JWT_SECRET_ENV))?
            .into_bytes();
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }

        let token_ttl = parse_or(get(JWT_TTL_ENV), JWT_TTL_ENV, Some(DEFAULT_TOKEN_TTL.as_secs()))
            .map(Duration::from_secs)?;
        if token_ttl.is_zero() {
            return Err(ConfigError::Invalid {
                name: JWT_TTL_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let public_routes =
            parse_route_list(&get(PUBLIC_ROUTES_ENV).unwrap_or_else(|| DEFAULT_PUBLIC_ROUTES.to_string()))?;

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    name: TLS_CERT_PATH_ENV,
                    reason: format!("{TLS_CERT_PATH_ENV} and {TLS_KEY_PATH_ENV} must be set together"),
                })
            }
        };

        let seed_admin = match (get(SEED_ADMIN_EMAIL_ENV), get(SEED_ADMIN_PASSWORD_ENV)) {
            (Some(email), Some(password)) => Some(SeedAdmin { email, password }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid {
                    name: SEED_ADMIN_EMAIL_ENV,
                    reason: format!("{SEED_ADMIN_EMAIL_ENV} and {SEED_ADMIN_PASSWORD_ENV} must be set together"),
                })
            }
        };

        Ok(Self {
            bind: SocketAddr::new(host, port),
            upstream_url,
            upstream_timeout,
            jwt_secret,
            token_ttl,
            public_routes,
            tls,
            seed_admin,
        })
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: Option<T>) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => default.ok_or(ConfigError::Missing(name)),
    }
}
