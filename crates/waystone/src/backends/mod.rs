//! Database Backend Abstractions
//!
//! This module provides database backend abstractions so the migration engine
//! can run against PostgreSQL and SQLite through common traits.

pub mod core;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

// Re-export core traits and types
pub use self::core::*;
pub use postgres::PostgresPool;
pub use sqlite::SqlitePool;

use crate::error::{MigrationError, MigrationResult};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    SQLite,
}

impl DatabaseBackendType {
    /// Detect the backend from a database URL scheme
    pub fn from_url(database_url: &str) -> MigrationResult<Self> {
        let parsed = url::Url::parse(database_url)
            .map_err(|e| MigrationError::Configuration(format!("invalid database URL: {}", e)))?;

        parsed.scheme().parse()
    }
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(DatabaseBackendType::PostgreSQL),
            "sqlite" => Ok(DatabaseBackendType::SQLite),
            _ => Err(MigrationError::Configuration(format!(
                "unsupported database backend: {}",
                s
            ))),
        }
    }
}

/// Open a pool for `database_url`, picking the backend from its scheme
pub async fn connect(database_url: &str) -> MigrationResult<Arc<dyn DatabasePool>> {
    let backend = DatabaseBackendType::from_url(database_url)?;
    tracing::debug!(%backend, "connecting to database");

    let pool: Arc<dyn DatabasePool> = match backend {
        DatabaseBackendType::PostgreSQL => Arc::new(
            PostgresPool::connect(database_url)
                .await
                .map_err(|e| connection_error(backend, e))?,
        ),
        DatabaseBackendType::SQLite => Arc::new(
            SqlitePool::connect(database_url)
                .await
                .map_err(|e| connection_error(backend, e))?,
        ),
    };

    Ok(pool)
}

fn connection_error(backend: DatabaseBackendType, err: sqlx::Error) -> MigrationError {
    MigrationError::Configuration(format!("failed to connect to {} database: {}", backend, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_backend_from_url() {
        assert_eq!(
            DatabaseBackendType::from_url("postgres://user:pw@localhost/app").unwrap(),
            DatabaseBackendType::PostgreSQL
        );
        assert_eq!(
            DatabaseBackendType::from_url("postgresql://localhost/app").unwrap(),
            DatabaseBackendType::PostgreSQL
        );
        assert_eq!(
            DatabaseBackendType::from_url("sqlite::memory:").unwrap(),
            DatabaseBackendType::SQLite
        );
        assert!(DatabaseBackendType::from_url("mysql://localhost/app").is_err());
        assert!(DatabaseBackendType::from_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_connect_sqlite_memory() {
        let pool = connect("sqlite::memory:").await.unwrap();
        assert_eq!(pool.sql_dialect(), SqlDialect::SQLite);
    }
}
