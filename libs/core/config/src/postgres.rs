use std::path::Path;

use crate::{ConfigError, FromEnv};

/// PostgreSQL configuration.
///
/// The DSN either comes directly from `DATABASE_URL` or, when that is unset,
/// from an info file whose entire contents are the DSN
/// (`GWM_PGS_INFO_FILE`, default `./pgsinfo.txt`).
#[derive(Clone, Debug)]
pub struct PostgresConfig {
    pub dsn: String,
}

impl PostgresConfig {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self { dsn: dsn.into() }
    }

    /// Read the DSN from an info file. The whole file is the connection
    /// string; surrounding whitespace is trimmed.
    pub fn from_info_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileError {
            path: path.display().to_string(),
            details: e.to_string(),
        })?;
        Ok(Self {
            dsn: contents.trim().to_string(),
        })
    }
}

impl FromEnv for PostgresConfig {
    fn from_env() -> Result<Self, ConfigError> {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            return Ok(Self::new(url));
        }
        let info_file =
            std::env::var("GWM_PGS_INFO_FILE").unwrap_or_else(|_| "./pgsinfo.txt".to_string());
        Self::from_info_file(info_file)
    }
}
