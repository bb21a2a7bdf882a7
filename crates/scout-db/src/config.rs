use std::path::Path;

use scout_core::AppError;

/// Configuration for the database connection pool.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// SQLite file at `path`, created on first connect.
    pub fn for_file(path: impl AsRef<Path>) -> Self {
        Self {
            url: format!("sqlite://{}", path.as_ref().display()),
            max_connections: 5,
        }
    }

    /// `DATABASE_URL` when set, otherwise the SQLite file at `path`.
    pub fn from_env_or_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        match std::env::var("DATABASE_URL") {
            Ok(url) => Ok(Self {
                url,
                max_connections: max_connections_from_env()?,
            }),
            Err(_) => Ok(Self {
                max_connections: max_connections_from_env()?,
                ..Self::for_file(path)
            }),
        }
    }
}

fn max_connections_from_env() -> Result<u32, AppError> {
    match std::env::var("DATABASE_MAX_CONNECTIONS") {
        Err(_) => Ok(5),
        Ok(raw) => {
            let parsed: u32 = raw.parse().map_err(|_| {
                AppError::ConfigError(format!(
                    "Invalid DATABASE_MAX_CONNECTIONS '{raw}': must be a positive integer"
                ))
            })?;
            if parsed == 0 {
                return Err(AppError::ConfigError(
                    "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
                ));
            }
            Ok(parsed)
        }
    }
}
