//! Database Seeding
//!
//! Seeds follow the exact contract of migrations: `{version}_{name}.sql`
//! files with an optional `-- +down` section, a gap-free sequence from 1, and
//! their own applied-state table. A missing seeds directory is an empty seed
//! set rather than an error.

use crate::error::MigrationResult;
use crate::migrations::{MigrationRunResult, MigrationRunner, MigrationState};

/// Runs seed files against the seeds directory and tracking table
#[derive(Clone)]
pub struct Seeder {
    runner: MigrationRunner,
}

impl Seeder {
    pub(crate) fn new(runner: MigrationRunner) -> Self {
        Self { runner }
    }

    /// Apply every pending seed in ascending version order
    pub async fn up(&self) -> MigrationResult<MigrationRunResult> {
        self.runner.run_up().await
    }

    /// Revert applied seeds above `target`, most recent first
    pub async fn down(&self, target: i64) -> MigrationResult<MigrationRunResult> {
        self.runner.run_down(target).await
    }

    /// Every discovered seed paired with its applied state
    pub async fn status(&self) -> MigrationResult<Vec<MigrationState>> {
        self.runner.status().await
    }

    /// Create a new seed file numbered after the highest existing version
    pub fn create_seed(&self, name: &str) -> MigrationResult<std::path::PathBuf> {
        self.runner.manager().create_migration(name)
    }
}
