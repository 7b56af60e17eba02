//! SQLite pool creation.

use std::path::Path;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::error::StoreError;
use crate::schema;

/// Queue store database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DbConfig {
    /// Connect to (and create if absent) the SQLite file at `path`.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            url: format!("sqlite:{}?mode=rwc", path.as_ref().display()),
            max_connections: 5,
        }
    }

    /// In-memory database, for tests.
    pub fn memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        }
    }
}

/// Create a pool and apply schema + pragmas.
pub async fn create_pool(config: DbConfig) -> Result<SqlitePool, StoreError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;

    schema::init(&pool).await?;

    Ok(pool)
}
