//! Migration Runner - Executes migrations against the database
//!
//! Every run reloads and revalidates the definitions from disk, takes the
//! cross-process lock, reads the applied set, and executes the pending
//! migrations one transaction each. The first failure stops the run; earlier
//! migrations of the same run stay applied.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use super::definitions::{
    Migration, MigrationDirection, MigrationRunResult, MigrationState, MigrationStatus,
};
use super::lock::{LockGuard, MigrationLock};
use super::manager::MigrationManager;
use super::state::AppliedStateStore;
use super::statements::split_sql_statements;
use super::validation::validate_sequence;
use crate::backends::{DatabasePool, DatabaseTransaction};
use crate::config::{IrreversiblePolicy, LockConfig};
use crate::error::{MigrationError, MigrationResult};

/// Migration runner bound to one source directory and one tracking table
#[derive(Clone)]
pub struct MigrationRunner {
    pool: Arc<dyn DatabasePool>,
    manager: MigrationManager,
    store: AppliedStateStore,
    lock: Option<MigrationLock>,
    irreversible_policy: IrreversiblePolicy,
}

impl MigrationRunner {
    /// Create a runner; `table` must already be a validated identifier
    pub fn new(
        pool: Arc<dyn DatabasePool>,
        manager: MigrationManager,
        table: &str,
        lock: &LockConfig,
        irreversible_policy: IrreversiblePolicy,
    ) -> Self {
        let store = AppliedStateStore::new(pool.clone(), table);
        let lock = lock
            .enabled
            .then(|| MigrationLock::new(pool.clone(), table, lock.clone()));

        Self {
            pool,
            manager,
            store,
            lock,
            irreversible_policy,
        }
    }

    pub fn manager(&self) -> &MigrationManager {
        &self.manager
    }

    pub fn store(&self) -> &AppliedStateStore {
        &self.store
    }

    pub fn lock(&self) -> Option<&MigrationLock> {
        self.lock.as_ref()
    }

    pub(crate) fn irreversible_policy(&self) -> IrreversiblePolicy {
        self.irreversible_policy
    }

    /// Load from disk and check sequence integrity; never cached
    pub fn load_validated(&self) -> MigrationResult<Vec<Migration>> {
        let migrations = self.manager.load_migrations()?;
        validate_sequence(&migrations)?;
        Ok(migrations)
    }

    /// Apply every pending migration in ascending version order
    pub async fn run_up(&self) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();
        let migrations = self.load_validated()?;

        self.store.ensure_table().await?;
        let guard = self.acquire_lock().await?;
        let result = self.apply_pending(&migrations).await;
        let released = self.release_lock(guard).await;

        let mut result = finish(result, released)?;
        result.execution_time_ms = start_time.elapsed().as_millis();

        tracing::info!(
            table = %self.store.table(),
            applied = result.versions.len(),
            skipped = result.skipped_count,
            elapsed_ms = %result.execution_time_ms,
            "migrate up finished"
        );
        Ok(result)
    }

    async fn apply_pending(&self, migrations: &[Migration]) -> MigrationResult<MigrationRunResult> {
        let applied = self.store.applied_versions().await?;
        self.warn_orphaned(migrations, &applied);

        let pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| !applied.contains(&m.version))
            .collect();

        let mut result = MigrationRunResult::empty(
            MigrationDirection::Up,
            migrations.len() - pending.len(),
        );

        for migration in pending {
            self.apply_migration(migration, MigrationDirection::Up).await?;
            result.versions.push(migration.version);
        }

        Ok(result)
    }

    /// Execute one migration as a single atomic unit
    ///
    /// All statements and the applied-state update share one transaction.
    /// On any failure the transaction is rolled back and nothing of this
    /// migration persists.
    pub async fn apply_migration(
        &self,
        migration: &Migration,
        direction: MigrationDirection,
    ) -> MigrationResult<()> {
        let statements = split_sql_statements(migration.body(direction));
        let total = statements.len();

        tracing::info!(
            version = migration.version,
            name = %migration.name,
            %direction,
            statements = total,
            "running migration"
        );

        let mut tx = self.pool.begin_transaction().await.map_err(|e| {
            MigrationError::state_store(
                self.store.table(),
                format!("begin a transaction for version {}", migration.version),
                e,
            )
        })?;

        for (index, statement) in statements.iter().enumerate() {
            tracing::debug!(version = migration.version, position = index + 1, total, "executing statement");

            if let Err(source) = tx.execute(statement, &[]).await {
                rollback_quietly(tx, migration.version).await;
                return Err(MigrationError::StatementExecution {
                    version: migration.version,
                    filename: migration.filename.clone(),
                    position: index + 1,
                    total,
                    source,
                });
            }
        }

        let recorded = match direction {
            MigrationDirection::Up => self.store.record_applied(tx.as_mut(), migration).await,
            MigrationDirection::Down => self.store.remove_applied(tx.as_mut(), migration).await,
        };
        if let Err(err) = recorded {
            rollback_quietly(tx, migration.version).await;
            return Err(err);
        }

        tx.commit().await.map_err(|source| MigrationError::Commit {
            version: migration.version,
            filename: migration.filename.clone(),
            source,
        })?;

        Ok(())
    }

    /// Every discovered migration paired with its applied state
    pub async fn status(&self) -> MigrationResult<Vec<MigrationState>> {
        let migrations = self.manager.load_migrations()?;

        self.store.ensure_table().await?;
        let records = self.store.applied_records().await?;

        let applied: BTreeSet<i64> = records.iter().map(|r| r.version).collect();
        self.warn_orphaned(&migrations, &applied);

        Ok(migrations
            .into_iter()
            .map(|migration| {
                let status = records
                    .iter()
                    .find(|r| r.version == migration.version)
                    .map_or(MigrationStatus::Pending, |r| MigrationStatus::Applied {
                        applied_at: r.applied_at,
                    });
                MigrationState { migration, status }
            })
            .collect())
    }

    /// Highest applied version, or 0 when nothing is applied
    pub async fn current_version(&self) -> MigrationResult<i64> {
        self.store.ensure_table().await?;
        Ok(self.store.applied_versions().await?.last().copied().unwrap_or(0))
    }

    pub(crate) async fn acquire_lock(&self) -> MigrationResult<Option<LockGuard>> {
        match &self.lock {
            Some(lock) => Ok(Some(lock.acquire().await?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn release_lock(&self, guard: Option<LockGuard>) -> MigrationResult<()> {
        match (&self.lock, guard) {
            (Some(lock), Some(guard)) => lock.release(guard).await,
            _ => Ok(()),
        }
    }

    pub(crate) fn warn_orphaned(&self, migrations: &[Migration], applied: &BTreeSet<i64>) {
        let known: BTreeSet<i64> = migrations.iter().map(|m| m.version).collect();
        for version in applied.difference(&known) {
            tracing::warn!(
                table = %self.store.table(),
                version,
                "applied version has no migration file"
            );
        }
    }
}

async fn rollback_quietly(tx: Box<dyn DatabaseTransaction>, version: i64) {
    if let Err(err) = tx.rollback().await {
        tracing::warn!(version, error = %err, "rollback of failed migration did not complete");
    }
}

/// Combine a run's outcome with the outcome of releasing its lock
pub(crate) fn finish<T>(
    result: MigrationResult<T>,
    released: MigrationResult<()>,
) -> MigrationResult<T> {
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release_err)) => {
            tracing::warn!(error = %release_err, "failed to release migration lock after error");
            Err(err)
        }
    }
}
