use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

/// Minimum length of the token signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Secret {0} not found in /run/secrets or the environment")]
    MissingSecret(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub store_backend: StoreBackend,
    pub redis_url: String,
    pub token_secret: String,
    pub token_ttl_hours: i64,
    pub cors_origins: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let token_secret = read_secret("TOKEN_SECRET")?;

        if token_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: "TOKEN_SECRET",
                reason: format!("must be at least {MIN_SECRET_LEN} bytes"),
            });
        }

        let token_ttl_hours: i64 = try_load("TOKEN_TTL_HOURS", "12")?;
        if token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_HOURS",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            port: try_load("RUST_PORT", "8080")?,
            store_backend: try_load("STORE_BACKEND", "memory")?,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379")?,
            token_secret,
            token_ttl_hours,
            cors_origins: parse_origins(&var("CORS_ORIGINS").unwrap_or_default()),
        })
    }
}

pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        })
}

fn read_secret(secret_name: &'static str) -> Result<String, ConfigError> {
    let path = format!("/run/secrets/{secret_name}");

    match read_to_string(&path) {
        Ok(secret) => Ok(secret.trim().to_string()),
        Err(e) => {
            warn!("Failed to read {secret_name} from file: {e}, trying environment");

            env::var(secret_name)
                .map(|s| s.trim().to_string())
                .map_err(|_| ConfigError::MissingSecret(secret_name))
        }
    }
}
