use std::{env, path::PathBuf, str::FromStr, time::Duration};

use gameshelf_library::{CatalogConfig, FallbackDatabase, NewPlainUser, TokenConfig};
use gameshelf_server::{ServerConfig, DEFAULT_PORT};
use log::warn;
use thiserror::Error;

const DEVELOPMENT_SECRET: &str = "gameshelf-development-secret";
const DEFAULT_DATA_FILE: &str = "gameshelf-data.json";

#[derive(Debug, Error)]
#[error("{name} must be {expected}, got \"{value}\"")]
pub struct ConfigError {
    name: &'static str,
    expected: &'static str,
    value: String,
}

/// Everything gameshelf reads from the environment
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    /// Absent means running on the volatile store only
    pub database_url: Option<String>,
    pub database_timeout: Duration,
    pub data_file: PathBuf,
    pub tokens: TokenConfig,
    pub catalog: CatalogConfig,
    /// Seeded at startup when all three admin variables are set
    pub admin: Option<NewPlainUser>,
}

impl Config {
    /// Reads the process environment, after loading a `.env` file if there is one
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let secret = var("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET is not set, using an insecure development secret");
            DEVELOPMENT_SECRET.to_string()
        });

        let expiration_days = parsed(
            "JWT_EXPIRATION_DAYS",
            var("JWT_EXPIRATION_DAYS"),
            "a number of days",
            TokenConfig::DEFAULT_EXPIRATION_DAYS,
        )?;

        let timeout_ms = parsed(
            "GAMESHELF_DB_TIMEOUT_MS",
            var("GAMESHELF_DB_TIMEOUT_MS"),
            "a number of milliseconds",
            FallbackDatabase::DEFAULT_TIMEOUT.as_millis() as u64,
        )?;

        let admin = match (
            var("GAMESHELF_ADMIN_USERNAME"),
            var("GAMESHELF_ADMIN_EMAIL"),
            var("GAMESHELF_ADMIN_PASSWORD"),
        ) {
            (Some(username), Some(email), Some(password)) => Some(NewPlainUser {
                username,
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            server: ServerConfig {
                port: parsed("GAMESHELF_PORT", var("GAMESHELF_PORT"), "a port", DEFAULT_PORT)?,
                allowed_origins: var("CORS_ORIGINS")
                    .map(|o| {
                        o.split(',')
                            .map(|o| o.trim().to_string())
                            .filter(|o| !o.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                environment: var("GAMESHELF_ENV").unwrap_or_else(|| "development".to_string()),
            },
            database_url: var("DATABASE_URL"),
            database_timeout: Duration::from_millis(timeout_ms),
            data_file: var("GAMESHELF_DATA_FILE")
                .unwrap_or_else(|| DEFAULT_DATA_FILE.to_string())
                .into(),
            tokens: TokenConfig::new(secret).with_expiration_days(expiration_days),
            catalog: CatalogConfig {
                api_key: var("RAWG_API_KEY"),
                base_url: var("RAWG_API_BASE")
                    .unwrap_or_else(|| CatalogConfig::DEFAULT_BASE_URL.to_string()),
                ..Default::default()
            },
            admin,
        })
    }
}

fn parsed<T: FromStr>(
    name: &'static str,
    value: Option<String>,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        Some(value) => value.parse().map_err(|_| ConfigError {
            name,
            expected,
            value,
        }),
        None => Ok(default),
    }
}
