//! API server configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use artmarket_core::auth::password::BCRYPT_COST;
use artmarket_core::auth::token::{DEFAULT_ACCESS_TTL_MS, DEFAULT_REFRESH_TTL_MS, MIN_SECRET_LEN};
use artmarket_core::rate_limit::RateLimitConfig;
use thiserror::Error;

/// Origins allowed when `CORS_ALLOWED_ORIGINS` is unset.
pub const DEFAULT_CORS_ORIGINS: &str =
    "https://artworkgallery-dev.up.railway.app,http://localhost:3000,http://localhost:5173";

/// Configuration errors. All are fatal at boot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Configuration for the API server.
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "0.0.0.0:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub access_token_ttl_ms: i64,
    pub refresh_token_ttl_ms: i64,
    /// Blanket limiter over every `/api/auth/` path.
    pub auth_rate_limit: RateLimitConfig,
    /// Limiter for login and registration.
    pub login_rate_limit: RateLimitConfig,
    /// Buckets idle this long are evicted.
    pub rate_limit_idle: Duration,
    /// Shared denylist; `None` keeps revocations in process memory.
    pub denylist_url: Option<String>,
    pub upload_dir: PathBuf,
    pub cors_allowed_origins: Vec<String>,
    /// Bound on each denylist and user directory call.
    pub io_timeout: Duration,
    pub bcrypt_cost: u32,
    pub password_hash_workers: usize,
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bind_addr", &self.bind_addr)
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_ms", &self.access_token_ttl_ms)
            .field("refresh_token_ttl_ms", &self.refresh_token_ttl_ms)
            .field("auth_rate_limit", &self.auth_rate_limit)
            .field("login_rate_limit", &self.login_rate_limit)
            .field("denylist", &self.denylist_url.as_ref().map(|_| "<redis>"))
            .field("upload_dir", &self.upload_dir)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("io_timeout", &self.io_timeout)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish_non_exhaustive()
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                          | Default                              |
    /// |-----------------------------------|--------------------------------------|
    /// | `BIND_ADDR`                       | `0.0.0.0:8080`                       |
    /// | `DATABASE_URL`                    | `postgres://localhost:5432/artmarket`|
    /// | `JWT_SECRET`                      | required, ≥ 32 bytes                 |
    /// | `JWT_EXPIRATION_MS`               | `3600000` (1 h)                      |
    /// | `JWT_REFRESH_EXPIRATION_MS`       | `604800000` (7 d)                    |
    /// | `RATE_LIMIT_AUTH_CAPACITY`        | `10`                                 |
    /// | `RATE_LIMIT_AUTH_WINDOW_SECONDS`  | `60`                                 |
    /// | `RATE_LIMIT_LOGIN_CAPACITY`       | `5`                                  |
    /// | `RATE_LIMIT_LOGIN_WINDOW_SECONDS` | `60`                                 |
    /// | `RATE_LIMIT_IDLE_SECONDS`         | `600`                                |
    /// | `DENYLIST_URL`                    | unset (in-memory)                    |
    /// | `FILE_UPLOAD_DIR`                 | `./uploads`                          |
    /// | `CORS_ALLOWED_ORIGINS`            | production + local dev origins       |
    /// | `ACCESS_IO_TIMEOUT_MS`            | `100`                                |
    /// | `BCRYPT_COST`                     | `10` (minimum)                       |
    /// | `PASSWORD_HASH_WORKERS`           | `4`                                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let access_token_ttl_ms = positive(&get, "JWT_EXPIRATION_MS", DEFAULT_ACCESS_TTL_MS)?;
        let refresh_token_ttl_ms =
            positive(&get, "JWT_REFRESH_EXPIRATION_MS", DEFAULT_REFRESH_TTL_MS)?;

        let auth_rate_limit = RateLimitConfig::new(
            positive(&get, "RATE_LIMIT_AUTH_CAPACITY", 10u32)?,
            Duration::from_secs(positive(&get, "RATE_LIMIT_AUTH_WINDOW_SECONDS", 60u64)?),
        );
        let login_rate_limit = RateLimitConfig::new(
            positive(&get, "RATE_LIMIT_LOGIN_CAPACITY", 5u32)?,
            Duration::from_secs(positive(&get, "RATE_LIMIT_LOGIN_WINDOW_SECONDS", 60u64)?),
        );

        let bcrypt_cost = parse(&get, "BCRYPT_COST", BCRYPT_COST)?;
        if !(BCRYPT_COST..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                var: "BCRYPT_COST",
                reason: format!("must be between {BCRYPT_COST} and 31"),
            });
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".into()),
            pg_connection_url: get("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost:5432/artmarket".into()),
            jwt_secret,
            access_token_ttl_ms,
            refresh_token_ttl_ms,
            auth_rate_limit,
            login_rate_limit,
            rate_limit_idle: Duration::from_secs(positive(&get, "RATE_LIMIT_IDLE_SECONDS", 600u64)?),
            denylist_url: get("DENYLIST_URL"),
            upload_dir: PathBuf::from(get("FILE_UPLOAD_DIR").unwrap_or_else(|| "./uploads".into())),
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.into())
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            io_timeout: Duration::from_millis(positive(&get, "ACCESS_IO_TIMEOUT_MS", 100u64)?),
            bcrypt_cost,
            password_hash_workers: positive(&get, "PASSWORD_HASH_WORKERS", 4usize)?,
        })
    }
}

fn parse<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match get(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
    }
}

fn positive<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let value = parse(get, var, default)?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(value)
}
