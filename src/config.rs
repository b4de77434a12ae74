use std::{env, net::SocketAddr, path::PathBuf, str::FromStr};

use chrono::Duration;
use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub data_root: PathBuf,
    pub cookie_secret: String,
    pub public_base_url: Url,
    pub session_ttl: Duration,
    pub reset_token_ttl: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://tripjournal.db".to_string());
        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let data_root = env::var("DATA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-trip-journal-cookie-secret".to_string());

        let public_base_url = Url::parse(
            &env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()),
        )
        .map_err(|err| AppError::Config(format!("invalid PUBLIC_BASE_URL: {err}")))?;

        let session_ttl = Duration::hours(parse_var("SESSION_TTL_HOURS", 24 * 14)?);
        let reset_token_ttl = Duration::minutes(parse_var("RESET_TOKEN_TTL_MINUTES", 60)?);

        Ok(Self {
            database_url,
            listen_addr,
            data_root,
            cookie_secret,
            public_base_url,
            session_ttl,
            reset_token_ttl,
        })
    }

    /// Absolute link to `path` under the public base URL.
    pub fn public_link(&self, path: &str) -> Result<String, AppError> {
        self.public_base_url
            .join(path)
            .map(String::from)
            .map_err(|err| AppError::Config(format!("cannot build link for {path}: {err}")))
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|err| AppError::Config(format!("invalid {name}: {err}"))),
        Err(_) => Ok(default),
    }
}
