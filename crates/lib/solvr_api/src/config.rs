//! API server configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;
use solvr_core::auth::TokenSettings;
use solvr_core::auth::jwt::{MIN_JWT_SECRET_LEN, resolve_jwt_secret};
use thiserror::Error;

/// Configuration errors surfaced at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("JWT secret must be at least 32 characters")]
    WeakJwtSecret,

    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Public frontend URL; claim links point here.
    pub app_url: String,
    /// Shared secret for `/v1/admin/*`. `None` disables those routes.
    pub admin_api_key: Option<String>,
    /// Signing secret, token lifetimes and lookup deadline.
    pub tokens: TokenSettings,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                       | Default                              |
    /// |--------------------------------|--------------------------------------|
    /// | `BIND_ADDR`                    | `127.0.0.1:8080`                     |
    /// | `DATABASE_URL`                 | `postgres://localhost:5432/solvr`    |
    /// | `JWT_SECRET` / `AUTH_SECRET`   | generated & persisted to file        |
    /// | `JWT_EXPIRY`                   | `15m`                                |
    /// | `REFRESH_TOKEN_EXPIRY`         | `7d`                                 |
    /// | `APP_URL`                      | `http://localhost:3000`              |
    /// | `ADMIN_API_KEY`                | unset                                |
    /// | `CREDENTIAL_LOOKUP_TIMEOUT_MS` | `2000`                               |
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = resolve_jwt_secret();
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakJwtSecret);
        }

        let mut tokens = TokenSettings::new(jwt_secret);
        if let Some(ttl) = duration_var("JWT_EXPIRY")? {
            tokens.access_token_ttl = ttl;
        }
        if let Some(ttl) = duration_var("REFRESH_TOKEN_EXPIRY")? {
            tokens.refresh_token_ttl = ttl;
        }
        if let Ok(raw) = std::env::var("CREDENTIAL_LOOKUP_TIMEOUT_MS") {
            let ms = raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                var: "CREDENTIAL_LOOKUP_TIMEOUT_MS",
                value: raw.clone(),
            })?;
            tokens.lookup_timeout = StdDuration::from_millis(ms);
        }

        Ok(Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".into()),
            pg_connection_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/solvr".into()),
            app_url: std::env::var("APP_URL").unwrap_or_else(|_| "http://localhost:3000".into()),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok().filter(|k| !k.is_empty()),
            tokens,
        })
    }

    /// Config suitable for tests: fixed secret, no admin key.
    pub fn for_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            pg_connection_url: String::new(),
            app_url: "http://localhost:3000".into(),
            admin_api_key: None,
            tokens: TokenSettings::new(jwt_secret),
        }
    }
}

fn duration_var(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => parse_duration(&raw)
            .map(Some)
            .ok_or(ConfigError::InvalidValue { var, value: raw }),
        Err(_) => Ok(None),
    }
}

/// Parse `30s`, `15m`, `24h` or `7d`.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let unit = raw.chars().last()?;
    let amount: i64 = raw[..raw.len() - unit.len_utf8()]
        .parse()
        .ok()
        .filter(|n| *n > 0)?;
    match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        'd' => Duration::try_days(amount),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_durations() {
        assert_eq!(parse_duration("15m"), Some(Duration::minutes(15)));
        assert_eq!(parse_duration("7d"), Some(Duration::days(7)));
        assert_eq!(parse_duration("24h"), Some(Duration::hours(24)));
        assert_eq!(parse_duration(" 90s "), Some(Duration::seconds(90)));
    }

    #[test]
    fn rejects_malformed_durations() {
        for raw in ["", "m", "15", "15w", "-5m", "0s", "1.5h", "5µ"] {
            assert_eq!(parse_duration(raw), None, "{raw:?}");
        }
    }
}
