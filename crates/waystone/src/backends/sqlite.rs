//! SQLite Backend Implementation
//!
//! SQLite serializes writers on the database file, so the pool is capped at a
//! single connection. That also keeps `sqlite::memory:` databases coherent:
//! every caller sees the same in-memory database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

use super::core::*;

/// SQLite connection pool implementation
#[derive(Debug, Clone)]
pub struct SqlitePool {
    pool: Pool<Sqlite>,
}

impl SqlitePool {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Connect to an SQLite database URL, creating the file if it is missing
    pub async fn connect(database_url: &str) -> DatabaseResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Ok(Self::new(pool))
    }

    /// Open a private in-memory database
    pub async fn in_memory() -> DatabaseResult<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Underlying sqlx pool
    pub fn inner(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for SqlitePool {
    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTransaction::new(tx)))
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let result = bind_database_values(sqlx::query(sql), params)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Vec<Box<dyn DatabaseRow>>> {
        let rows = bind_database_values(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| Box::new(SqliteRowAdapter::new(row)) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Option<Box<dyn DatabaseRow>>> {
        let row = bind_database_values(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Box::new(SqliteRowAdapter::new(r)) as Box<dyn DatabaseRow>))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }
}

/// SQLite transaction implementation
pub struct SqliteTransaction {
    tx: Option<sqlx::Transaction<'static, Sqlite>>,
}

impl SqliteTransaction {
    pub fn new(tx: sqlx::Transaction<'static, Sqlite>) -> Self {
        Self { tx: Some(tx) }
    }
}

fn completed() -> sqlx::Error {
    sqlx::Error::Protocol("transaction already completed".to_string())
}

#[async_trait]
impl DatabaseTransaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<u64> {
        let tx = self.tx.as_mut().ok_or_else(completed)?;

        let result = bind_database_values(sqlx::query(sql), params)
            .execute(&mut **tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn commit(mut self: Box<Self>) -> DatabaseResult<()> {
        let tx = self.tx.take().ok_or_else(completed)?;
        tx.commit().await
    }

    async fn rollback(mut self: Box<Self>) -> DatabaseResult<()> {
        let tx = self.tx.take().ok_or_else(completed)?;
        tx.rollback().await
    }
}

/// SQLite row implementation
pub struct SqliteRowAdapter {
    row: SqliteRow,
}

impl SqliteRowAdapter {
    pub fn new(row: SqliteRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for SqliteRowAdapter {
    fn get_i64(&self, column: &str) -> DatabaseResult<i64> {
        self.row.try_get(column)
    }

    fn get_string(&self, column: &str) -> DatabaseResult<String> {
        self.row.try_get(column)
    }

    fn get_datetime(&self, column: &str) -> DatabaseResult<DateTime<Utc>> {
        self.row.try_get(column)
    }
}

fn bind_database_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[DatabaseValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            DatabaseValue::Null => query.bind(Option::<String>::None),
            DatabaseValue::Int64(i) => query.bind(*i),
            DatabaseValue::String(s) => query.bind(s.clone()),
            DatabaseValue::DateTime(dt) => query.bind(*dt),
        };
    }
    query
}
