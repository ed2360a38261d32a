//! Migrator - the engine's public face
//!
//! Composes the loader, validator, applied-state store, lock, and execution
//! engine into `up` and `down`. Nothing is cached between calls: each call
//! builds a fresh runner and reloads definitions from disk.

use std::path::PathBuf;
use std::sync::Arc;

use crate::backends::{self, DatabasePool};
use crate::config::MigratorConfig;
use crate::error::MigrationResult;
use crate::migrations::{
    MigrationLock, MigrationManager, MigrationRunResult, MigrationRunner, MigrationState,
};
use crate::seeding::Seeder;

/// Schema migration engine over an open database pool
#[derive(Clone)]
pub struct Migrator {
    pool: Arc<dyn DatabasePool>,
    config: MigratorConfig,
}

impl std::fmt::Debug for Migrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Migrator")
            .field("dialect", &self.pool.sql_dialect())
            .field("config", &self.config)
            .finish()
    }
}

impl Migrator {
    /// Create a migrator; fails if the configuration is invalid
    pub fn new(pool: Arc<dyn DatabasePool>, config: MigratorConfig) -> MigrationResult<Self> {
        config.validate()?;
        Ok(Self { pool, config })
    }

    /// Create a migrator with the default configuration
    pub fn with_defaults(pool: Arc<dyn DatabasePool>) -> MigrationResult<Self> {
        Self::new(pool, MigratorConfig::default())
    }

    /// Connect to `database_url` and create a migrator
    pub async fn connect(database_url: &str, config: MigratorConfig) -> MigrationResult<Self> {
        config.validate()?;
        let pool = backends::connect(database_url).await?;
        Self::new(pool, config)
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<dyn DatabasePool> {
        &self.pool
    }

    fn runner(&self) -> MigrationRunner {
        MigrationRunner::new(
            self.pool.clone(),
            MigrationManager::new(&self.config.migrations_dir),
            &self.config.migrations_table,
            &self.config.lock,
            self.config.irreversible_policy,
        )
    }

    /// Apply all pending migrations in ascending version order
    pub async fn up(&self) -> MigrationResult<MigrationRunResult> {
        self.runner().run_up().await
    }

    /// Revert all applied migrations above `target`, most recent first
    pub async fn down(&self, target: i64) -> MigrationResult<MigrationRunResult> {
        self.runner().run_down(target).await
    }

    /// Every discovered migration paired with its applied state
    pub async fn status(&self) -> MigrationResult<Vec<MigrationState>> {
        self.runner().status().await
    }

    /// Highest applied migration version, or 0
    pub async fn current_version(&self) -> MigrationResult<i64> {
        self.runner().current_version().await
    }

    /// Write a new `{next_version}_{name}.sql` file into the migrations directory
    pub fn create_migration(&self, name: &str) -> MigrationResult<PathBuf> {
        MigrationManager::new(&self.config.migrations_dir).create_migration(name)
    }

    /// Remove a lock left behind by a crashed process
    pub async fn force_unlock(&self) -> MigrationResult<bool> {
        MigrationLock::new(
            self.pool.clone(),
            &self.config.migrations_table,
            self.config.lock.clone(),
        )
        .force_release()
        .await
    }

    /// Seed runner over the configured seeds directory and table
    pub fn seeds(&self) -> Seeder {
        Seeder::new(MigrationRunner::new(
            self.pool.clone(),
            MigrationManager::new(&self.config.seeds_dir).allow_missing_dir(),
            &self.config.seeds_table,
            &self.config.lock,
            self.config.irreversible_policy,
        ))
    }
}
