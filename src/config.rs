use std::env;

use actix_web::cookie::Key;

use crate::errors::AppError;

/// Runtime settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub session_key: String,
    pub bind_address: String,
    pub port: u16,
    /// Reject proposals whose submitted totals disagree with the recomputation.
    pub strict_totals: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        let database_url = env::var("DATABASE_URL").map_err(|e| {
            log::error!("FATAL: DATABASE_URL environment variable not set: {}", e);
            AppError::EnvVarError(e)
        })?;
        let session_key = env::var("SESSION_KEY").map_err(|e| {
            log::error!("FATAL: SESSION_KEY environment variable not set: {}", e);
            AppError::EnvVarError(e)
        })?;

        let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_owned());
        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| AppError::ConfigError(format!("PORT is not a valid port: {raw}")))?,
            Err(_) => 8080,
        };
        let strict_totals = env::var("STRICT_TOTALS")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            session_key,
            bind_address,
            port,
            strict_totals,
        })
    }

    /// Cookie signing key derived from `SESSION_KEY`.
    pub fn cookie_key(&self) -> Result<Key, AppError> {
        Key::try_from(self.session_key.as_bytes()).map_err(|e| {
            log::error!("FATAL: SESSION_KEY must be at least 64 bytes long");
            AppError::ConfigError(format!("invalid SESSION_KEY: {e}"))
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
