//! Cross-process migration lock
//!
//! A lease table next to the tracking table holds at most one row. Inserting
//! that row takes the lock; a primary-key conflict means another process is
//! running migrations against the same table. The row is deleted by its
//! holder when the run ends.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::backends::{DatabasePool, DatabaseValue, SqlDialect};
use crate::config::{lock_table_name, LockConfig};
use crate::error::{MigrationError, MigrationResult};

/// Lease table guarding one tracking table
#[derive(Clone)]
pub struct MigrationLock {
    pool: Arc<dyn DatabasePool>,
    table: String,
    config: LockConfig,
}

/// Proof of a held lock; hand it back to [`MigrationLock::release`]
#[derive(Debug)]
#[must_use = "a held migration lock must be released"]
pub struct LockGuard {
    holder: String,
}

impl LockGuard {
    pub fn holder(&self) -> &str {
        &self.holder
    }
}

impl MigrationLock {
    /// Lock guarding `tracking_table`, stored in `{tracking_table}_lock`
    pub fn new(pool: Arc<dyn DatabasePool>, tracking_table: &str, config: LockConfig) -> Self {
        Self {
            pool,
            table: lock_table_name(tracking_table),
            config,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn dialect(&self) -> SqlDialect {
        self.pool.sql_dialect()
    }

    async fn ensure_table(&self) -> MigrationResult<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
                id INTEGER PRIMARY KEY,\n    \
                holder TEXT NOT NULL,\n    \
                acquired_at {} NOT NULL\n\
            )",
            self.table,
            self.dialect().timestamp_type()
        );

        self.pool
            .execute(&sql, &[])
            .await
            .map_err(|e| MigrationError::state_store(&self.table, "create the lock table", e))?;
        Ok(())
    }

    /// Current holder of the lock, if any
    pub async fn holder(&self) -> MigrationResult<Option<String>> {
        self.ensure_table().await?;

        let sql = format!("SELECT holder FROM {} WHERE id = 1", self.table);
        let row = self
            .pool
            .fetch_optional(&sql, &[])
            .await
            .map_err(|e| MigrationError::state_store(&self.table, "read the lock holder", e))?;

        row.map(|row| row.get_string("holder"))
            .transpose()
            .map_err(|e| MigrationError::state_store(&self.table, "read the lock holder", e))
    }

    /// Take the lock, waiting up to the configured timeout
    pub async fn acquire(&self) -> MigrationResult<LockGuard> {
        self.ensure_table().await?;

        let holder = Uuid::new_v4().to_string();
        // A timeout too large to represent waits forever.
        let deadline = tokio::time::Instant::now().checked_add(self.config.timeout());

        loop {
            let insert_err = match self.try_insert(&holder).await {
                Ok(()) => {
                    tracing::debug!(table = %self.table, %holder, "migration lock acquired");
                    return Ok(LockGuard { holder });
                }
                Err(err) => err,
            };

            if !is_conflict(&insert_err) {
                return Err(MigrationError::state_store(
                    &self.table,
                    "acquire the migration lock",
                    insert_err,
                ));
            }

            // Released between the insert and this read.
            let Some(current) = self.holder().await? else {
                continue;
            };

            if deadline.is_some_and(|deadline| tokio::time::Instant::now() >= deadline) {
                return Err(MigrationError::LockUnavailable {
                    table: self.table.clone(),
                    holder: current,
                });
            }

            tracing::debug!(table = %self.table, %current, "migration lock busy, waiting");
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    async fn try_insert(&self, holder: &str) -> Result<(), sqlx::Error> {
        let sql = format!(
            "INSERT INTO {} (id, holder, acquired_at) VALUES (1, {}, {})",
            self.table,
            self.dialect().parameter_placeholder(0),
            self.dialect().parameter_placeholder(1)
        );

        self.pool
            .execute(&sql, &[DatabaseValue::from(holder), DatabaseValue::DateTime(Utc::now())])
            .await
            .map(|_| ())
    }

    /// Release a lock taken by [`MigrationLock::acquire`]
    pub async fn release(&self, guard: LockGuard) -> MigrationResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE id = 1 AND holder = {}",
            self.table,
            self.dialect().parameter_placeholder(0)
        );

        let affected = self
            .pool
            .execute(&sql, &[DatabaseValue::from(guard.holder.as_str())])
            .await
            .map_err(|e| MigrationError::state_store(&self.table, "release the migration lock", e))?;

        if affected == 0 {
            tracing::warn!(
                table = %self.table,
                holder = %guard.holder,
                "migration lock was already released by someone else"
            );
        } else {
            tracing::debug!(table = %self.table, holder = %guard.holder, "migration lock released");
        }
        Ok(())
    }

    /// Remove the lock row regardless of holder; returns whether a row existed
    pub async fn force_release(&self) -> MigrationResult<bool> {
        self.ensure_table().await?;

        let sql = format!("DELETE FROM {} WHERE id = 1", self.table);
        let affected = self
            .pool
            .execute(&sql, &[])
            .await
            .map_err(|e| MigrationError::state_store(&self.table, "force-release the migration lock", e))?;

        if affected > 0 {
            tracing::warn!(table = %self.table, "stale migration lock removed");
        }
        Ok(affected > 0)
    }
}

fn is_conflict(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}
