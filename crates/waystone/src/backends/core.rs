//! Core Database Backend Traits
//!
//! The engine never talks to a driver directly. It works against these
//! traits so the same loader/runner code drives PostgreSQL, SQLite, or a
//! test double.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result type for raw driver calls
pub type DatabaseResult<T> = Result<T, sqlx::Error>;

/// Abstract database connection pool trait
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Begin a transaction owning its own connection
    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>>;

    /// Execute a statement outside of any transaction
    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Execute a query and return all result rows
    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>>;

    /// Execute a query and return the first result row
    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Option<Box<dyn DatabaseRow>>>;

    /// SQL dialect spoken by this pool
    fn sql_dialect(&self) -> SqlDialect;
}

/// Abstract database transaction trait
#[async_trait]
pub trait DatabaseTransaction: Send {
    /// Execute a statement within the transaction
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> DatabaseResult<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> DatabaseResult<()>;
}

/// Typed column access on a result row
pub trait DatabaseRow: Send + Sync {
    fn get_i64(&self, column: &str) -> DatabaseResult<i64>;

    fn get_string(&self, column: &str) -> DatabaseResult<String>;

    fn get_datetime(&self, column: &str) -> DatabaseResult<DateTime<Utc>>;
}

/// Parameter values bound to tracking-table queries
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Int64(i64),
    String(String),
    DateTime(DateTime<Utc>),
}

impl DatabaseValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl From<DateTime<Utc>> for DatabaseValue {
    fn from(value: DateTime<Utc>) -> Self {
        DatabaseValue::DateTime(value)
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// SQL dialect enumeration for generating database-specific SQL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    PostgreSQL,
    SQLite,
}

impl SqlDialect {
    /// Parameter placeholder for the zero-based parameter `index`
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSQL => format!("${}", index + 1),
            SqlDialect::SQLite => "?".to_string(),
        }
    }

    /// Column type used for version numbers
    pub fn version_type(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "BIGINT",
            SqlDialect::SQLite => "INTEGER",
        }
    }

    /// Column type used for timezone-aware timestamps
    pub fn timestamp_type(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "TIMESTAMPTZ",
            SqlDialect::SQLite => "TEXT",
        }
    }

    /// Current timestamp expression, used as a column default
    pub fn current_timestamp(&self) -> &'static str {
        match self {
            SqlDialect::PostgreSQL => "NOW()",
            SqlDialect::SQLite => "CURRENT_TIMESTAMP",
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlDialect::PostgreSQL => write!(f, "postgresql"),
            SqlDialect::SQLite => write!(f, "sqlite"),
        }
    }
}
