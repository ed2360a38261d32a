//! Migration Rollback - Handles rolling back applied migrations
//!
//! Reverts applied migrations above a target version, most recent first, so
//! schema changes are undone in reverse dependency order.

use std::time::Instant;

use super::definitions::{Migration, MigrationDirection, MigrationRunResult};
use super::runner::{finish, MigrationRunner};
use crate::config::IrreversiblePolicy;
use crate::error::{MigrationError, MigrationResult};

impl MigrationRunner {
    /// Revert every applied migration with a version strictly above `target`
    pub async fn run_down(&self, target: i64) -> MigrationResult<MigrationRunResult> {
        let start_time = Instant::now();
        let migrations = self.load_validated()?;

        self.store().ensure_table().await?;
        let guard = self.acquire_lock().await?;
        let result = self.revert_pending(&migrations, target).await;
        let released = self.release_lock(guard).await;

        let mut result = finish(result, released)?;
        result.execution_time_ms = start_time.elapsed().as_millis();

        tracing::info!(
            table = %self.store().table(),
            target,
            reverted = result.versions.len(),
            irreversible = result.irreversible.len(),
            elapsed_ms = %result.execution_time_ms,
            "migrate down finished"
        );
        Ok(result)
    }

    async fn revert_pending(
        &self,
        migrations: &[Migration],
        target: i64,
    ) -> MigrationResult<MigrationRunResult> {
        let applied = self.store().applied_versions().await?;
        self.warn_orphaned(migrations, &applied);

        let pending: Vec<&Migration> = migrations
            .iter()
            .rev()
            .filter(|m| m.version > target && applied.contains(&m.version))
            .collect();

        if self.irreversible_policy() == IrreversiblePolicy::Forbid {
            if let Some(migration) = pending.iter().find(|m| !m.is_reversible()) {
                return Err(MigrationError::Irreversible {
                    version: migration.version,
                    filename: migration.filename.clone(),
                });
            }
        }

        let mut result = MigrationRunResult::empty(
            MigrationDirection::Down,
            migrations.len() - pending.len(),
        );

        for migration in pending {
            if !migration.is_reversible() {
                tracing::warn!(
                    version = migration.version,
                    filename = %migration.filename,
                    "migration has no down section; removing its record without reverting schema changes"
                );
                result.irreversible.push(migration.version);
            }

            self.apply_migration(migration, MigrationDirection::Down).await?;
            result.versions.push(migration.version);
        }

        Ok(result)
    }
}
