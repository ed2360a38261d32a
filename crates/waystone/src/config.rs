//! Migrator configuration
//!
//! Directories and tracking-table names are trusted, configuration-time
//! values. Table names are interpolated into SQL text, so they are checked
//! against a strict identifier pattern before any engine is built.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{MigrationError, MigrationResult};

/// Default directory scanned for migration files
pub const DEFAULT_MIGRATIONS_DIR: &str = "./migrations";
/// Default applied-state table for migrations
pub const DEFAULT_MIGRATIONS_TABLE: &str = "waystone_migrations";
/// Default directory scanned for seed files
pub const DEFAULT_SEEDS_DIR: &str = "./seeds";
/// Default applied-state table for seeds
pub const DEFAULT_SEEDS_TABLE: &str = "waystone_seeds";

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("identifier pattern is valid")
});

/// What `down` does when it reaches a migration with an empty down section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrreversiblePolicy {
    /// Run the empty rollback, delete the record and emit a warning
    #[default]
    Warn,
    /// Refuse the whole `down` call before executing any migration
    Forbid,
}

/// Cross-process lock settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Take the lock around every `up`/`down` run
    pub enabled: bool,
    /// How long to wait for a lock held by another process
    pub timeout_seconds: u64,
    /// Delay between acquisition attempts
    pub poll_interval_ms: u64,
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Lock configuration with locking turned off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: 30,
            poll_interval_ms: 250,
        }
    }
}

/// Configuration for the migration system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorConfig {
    /// Directory where migration files are stored
    pub migrations_dir: PathBuf,
    /// Table name for tracking applied migrations
    pub migrations_table: String,
    /// Directory where seed files are stored
    pub seeds_dir: PathBuf,
    /// Table name for tracking applied seeds
    pub seeds_table: String,
    /// Behaviour of `down` past a migration without a down section
    pub irreversible_policy: IrreversiblePolicy,
    /// Cross-process lock settings
    pub lock: LockConfig,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            migrations_dir: PathBuf::from(DEFAULT_MIGRATIONS_DIR),
            migrations_table: DEFAULT_MIGRATIONS_TABLE.to_string(),
            seeds_dir: PathBuf::from(DEFAULT_SEEDS_DIR),
            seeds_table: DEFAULT_SEEDS_TABLE.to_string(),
            irreversible_policy: IrreversiblePolicy::default(),
            lock: LockConfig::default(),
        }
    }
}

impl MigratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_migrations_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.migrations_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_migrations_table(mut self, table: impl Into<String>) -> Self {
        self.migrations_table = table.into();
        self
    }

    pub fn with_seeds_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.seeds_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_seeds_table(mut self, table: impl Into<String>) -> Self {
        self.seeds_table = table.into();
        self
    }

    pub fn with_irreversible_policy(mut self, policy: IrreversiblePolicy) -> Self {
        self.irreversible_policy = policy;
        self
    }

    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    /// Check that every configured table name is a plain SQL identifier
    pub fn validate(&self) -> MigrationResult<()> {
        validate_identifier("migrations_table", &self.migrations_table)?;
        validate_identifier("seeds_table", &self.seeds_table)?;

        if self.migrations_table == self.seeds_table {
            return Err(MigrationError::Configuration(format!(
                "migrations and seeds cannot share the tracking table '{}'",
                self.migrations_table
            )));
        }

        for (table, other) in [
            (&self.migrations_table, &self.seeds_table),
            (&self.seeds_table, &self.migrations_table),
        ] {
            if *table == lock_table_name(other) {
                return Err(MigrationError::Configuration(format!(
                    "tracking table '{}' collides with the lock table of '{}'",
                    table, other
                )));
            }
        }

        Ok(())
    }
}

/// Lease table guarding `tracking_table`
pub fn lock_table_name(tracking_table: &str) -> String {
    format!("{}_lock", tracking_table)
}

fn validate_identifier(field: &str, value: &str) -> MigrationResult<()> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(MigrationError::Configuration(format!(
            "{} '{}' is not a valid SQL identifier",
            field, value
        )))
    }
}
