//! Applied-state store
//!
//! A regular table inside the target database recording which versions are
//! applied. Rows are inserted by a successful forward run and deleted by a
//! successful rollback, always inside the migration's own transaction.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use super::definitions::{AppliedRecord, Migration};
use crate::backends::{DatabasePool, DatabaseRow, DatabaseTransaction, DatabaseValue, SqlDialect};
use crate::error::{MigrationError, MigrationResult};

/// Reads and writes one applied-state table
#[derive(Clone)]
pub struct AppliedStateStore {
    pool: Arc<dyn DatabasePool>,
    table: String,
}

impl AppliedStateStore {
    /// `table` must already be a validated identifier
    pub fn new(pool: Arc<dyn DatabasePool>, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn dialect(&self) -> SqlDialect {
        self.pool.sql_dialect()
    }

    /// Ensure the tracking table exists
    pub async fn ensure_table(&self) -> MigrationResult<()> {
        let sql = create_table_sql(self.dialect(), &self.table);
        self.pool
            .execute(&sql, &[])
            .await
            .map_err(|e| MigrationError::state_store(&self.table, "create the tracking table", e))?;
        Ok(())
    }

    /// All applied records, ascending by version
    pub async fn applied_records(&self) -> MigrationResult<Vec<AppliedRecord>> {
        let sql = select_applied_sql(&self.table);
        let rows = self
            .pool
            .fetch_all(&sql, &[])
            .await
            .map_err(|e| MigrationError::state_store(&self.table, "read applied versions", e))?;

        rows.iter()
            .map(|row| self.record_from_row(&**row))
            .collect()
    }

    /// Set of applied versions
    pub async fn applied_versions(&self) -> MigrationResult<BTreeSet<i64>> {
        Ok(self
            .applied_records()
            .await?
            .into_iter()
            .map(|record| record.version)
            .collect())
    }

    fn record_from_row(&self, row: &dyn DatabaseRow) -> MigrationResult<AppliedRecord> {
        let decode = |e| MigrationError::state_store(&self.table, "decode an applied record", e);

        Ok(AppliedRecord {
            version: row.get_i64("version").map_err(decode)?,
            filename: row.get_string("filename").map_err(decode)?,
            applied_at: row.get_datetime("applied_at").map_err(decode)?,
        })
    }

    /// Insert the applied record for `migration` inside `tx`
    pub async fn record_applied(
        &self,
        tx: &mut dyn DatabaseTransaction,
        migration: &Migration,
    ) -> MigrationResult<()> {
        let sql = insert_record_sql(self.dialect(), &self.table);
        let params = [
            DatabaseValue::Int64(migration.version),
            DatabaseValue::from(migration.filename.as_str()),
            DatabaseValue::DateTime(Utc::now()),
        ];

        tx.execute(&sql, &params).await.map_err(|e| {
            MigrationError::state_store(
                &self.table,
                format!("record version {} as applied", migration.version),
                e,
            )
        })?;
        Ok(())
    }

    /// Delete the applied record for `migration` inside `tx`
    pub async fn remove_applied(
        &self,
        tx: &mut dyn DatabaseTransaction,
        migration: &Migration,
    ) -> MigrationResult<()> {
        let operation = || format!("remove the record of version {}", migration.version);
        let sql = delete_record_sql(self.dialect(), &self.table);

        let affected = tx
            .execute(&sql, &[DatabaseValue::Int64(migration.version)])
            .await
            .map_err(|e| MigrationError::state_store(&self.table, operation(), e))?;

        if affected != 1 {
            return Err(MigrationError::state_store(
                &self.table,
                operation(),
                sqlx::Error::RowNotFound,
            ));
        }
        Ok(())
    }
}

/// SQL to create the tracking table
pub fn create_table_sql(dialect: SqlDialect, table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    \
            version {} PRIMARY KEY,\n    \
            filename TEXT NOT NULL,\n    \
            applied_at {} NOT NULL DEFAULT {}\n\
        )",
        table,
        dialect.version_type(),
        dialect.timestamp_type(),
        dialect.current_timestamp()
    )
}

/// SQL to read every applied record
pub fn select_applied_sql(table: &str) -> String {
    format!(
        "SELECT version, filename, applied_at FROM {} ORDER BY version ASC",
        table
    )
}

/// SQL to record a version as applied
pub fn insert_record_sql(dialect: SqlDialect, table: &str) -> String {
    format!(
        "INSERT INTO {} (version, filename, applied_at) VALUES ({}, {}, {})",
        table,
        dialect.parameter_placeholder(0),
        dialect.parameter_placeholder(1),
        dialect.parameter_placeholder(2)
    )
}

/// SQL to remove a version's record
pub fn delete_record_sql(dialect: SqlDialect, table: &str) -> String {
    format!(
        "DELETE FROM {} WHERE version = {}",
        table,
        dialect.parameter_placeholder(0)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::SqlitePool;

    fn migration(version: i64) -> Migration {
        Migration {
            version,
            name: "init".to_string(),
            filename: format!("{}_init.sql", version),
            up_sql: String::new(),
            down_sql: String::new(),
        }
    }

    #[test]
    fn test_sql_generation() {
        let create = create_table_sql(SqlDialect::PostgreSQL, "waystone_migrations");
        assert!(create.contains("CREATE TABLE IF NOT EXISTS waystone_migrations"));
        assert!(create.contains("version BIGINT PRIMARY KEY"));
        assert!(create.contains("filename TEXT NOT NULL"));
        assert!(create.contains("applied_at TIMESTAMPTZ NOT NULL"));

        assert_eq!(
            insert_record_sql(SqlDialect::PostgreSQL, "waystone_migrations"),
            "INSERT INTO waystone_migrations (version, filename, applied_at) VALUES ($1, $2, $3)"
        );
        assert_eq!(
            delete_record_sql(SqlDialect::SQLite, "waystone_seeds"),
            "DELETE FROM waystone_seeds WHERE version = ?"
        );
    }

    #[tokio::test]
    async fn test_record_and_remove_round_trip() {
        let pool: Arc<dyn DatabasePool> = Arc::new(SqlitePool::in_memory().await.unwrap());
        let store = AppliedStateStore::new(pool.clone(), "waystone_migrations");
        store.ensure_table().await.unwrap();
        store.ensure_table().await.unwrap();

        let mut tx = pool.begin_transaction().await.unwrap();
        store.record_applied(tx.as_mut(), &migration(1)).await.unwrap();
        store.record_applied(tx.as_mut(), &migration(2)).await.unwrap();
        tx.commit().await.unwrap();

        let records = store.applied_records().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].version, 1);
        assert_eq!(records[0].filename, "1_init.sql");

        let mut tx = pool.begin_transaction().await.unwrap();
        store.remove_applied(tx.as_mut(), &migration(2)).await.unwrap();
        tx.commit().await.unwrap();

        let versions = store.applied_versions().await.unwrap();
        assert_eq!(versions.into_iter().collect::<Vec<_>>(), vec![1]);
    }

    #[tokio::test]
    async fn test_removing_unknown_version_fails() {
        let pool: Arc<dyn DatabasePool> = Arc::new(SqlitePool::in_memory().await.unwrap());
        let store = AppliedStateStore::new(pool.clone(), "waystone_migrations");
        store.ensure_table().await.unwrap();

        let mut tx = pool.begin_transaction().await.unwrap();
        let err = store.remove_applied(tx.as_mut(), &migration(9)).await.unwrap_err();
        tx.rollback().await.unwrap();

        assert!(matches!(err, MigrationError::StateStore { .. }));
    }

    #[tokio::test]
    async fn test_missing_table_is_a_state_store_error() {
        let pool: Arc<dyn DatabasePool> = Arc::new(SqlitePool::in_memory().await.unwrap());
        let store = AppliedStateStore::new(pool, "never_created");

        let err = store.applied_records().await.unwrap_err();
        assert!(matches!(err, MigrationError::StateStore { ref table, .. } if table == "never_created"));
    }
}
