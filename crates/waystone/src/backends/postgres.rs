//! PostgreSQL Backend Implementation
//!
//! This module provides the PostgreSQL-specific implementation of the database
//! backend traits using sqlx as the underlying database driver.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Pool, Postgres, Row};

use super::core::*;

/// PostgreSQL connection pool implementation
#[derive(Debug, Clone)]
pub struct PostgresPool {
    pool: Pool<Postgres>,
}

impl PostgresPool {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Connect to a PostgreSQL database URL
    pub async fn connect(database_url: &str) -> DatabaseResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;

        Ok(Self::new(pool))
    }

    /// Underlying sqlx pool
    pub fn inner(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl DatabasePool for PostgresPool {
    async fn begin_transaction(&self) -> DatabaseResult<Box<dyn DatabaseTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction::new(tx)))
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
            .map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(&self, sql: &str, params: &[DatabaseValue]) -> DatabaseResult<Option<Box<dyn DatabaseRow>>> {
        let row = bind_database_values(sqlx::query(sql), params)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Box::new(PostgresRow::new(r)) as Box<dyn DatabaseRow>))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
    }
}

/// PostgreSQL transaction implementation
pub struct PostgresTransaction {
    tx: Option<sqlx::Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    pub fn new(tx: sqlx::Transaction<'static, Postgres>) -> Self {
        Self { tx: Some(tx) }
    }
}

fn completed() -> sqlx::Error {
    sqlx::Error::Protocol("transaction already completed".to_string())
}

#[async_trait]
impl DatabaseTransaction for PostgresTransaction {
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

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: PgRow,
}

impl PostgresRow {
    pub fn new(row: PgRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for PostgresRow {
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

/// Bind DatabaseValues to a sqlx query in order
fn bind_database_values<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[DatabaseValue],
) -> Query<'q, Postgres, PgArguments> {
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
