//! Migration Definitions - Core types and structures for migrations
//!
//! Defines the fundamental types used throughout the migration system including
//! Migration, AppliedRecord, and the results reported by a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One versioned unit of forward/backward SQL, parsed from `{version}_{name}.sql`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Leading numeric token of the filename
    pub version: i64,
    /// Filename segment following the version token
    pub name: String,
    /// Original source filename
    pub filename: String,
    /// SQL to apply when moving forward
    pub up_sql: String,
    /// SQL to apply when reversing; empty when the file has no down section
    pub down_sql: String,
}

impl Migration {
    /// A migration without a down section cannot undo its schema change
    pub fn is_reversible(&self) -> bool {
        !self.down_sql.is_empty()
    }

    /// Change-set body for the given direction
    pub fn body(&self, direction: MigrationDirection) -> &str {
        match direction {
            MigrationDirection::Up => &self.up_sql,
            MigrationDirection::Down => &self.down_sql,
        }
    }
}

/// Row of the applied-state table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedRecord {
    pub version: i64,
    /// Filename at time of application
    pub filename: String,
    pub applied_at: DateTime<Utc>,
}

/// Migration direction for execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationDirection {
    /// Apply the migration (run UP statements)
    Up,
    /// Rollback the migration (run DOWN statements)
    Down,
}

impl std::fmt::Display for MigrationDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationDirection::Up => write!(f, "up"),
            MigrationDirection::Down => write!(f, "down"),
        }
    }
}

/// Migration status in the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MigrationStatus {
    /// Migration is pending (not yet applied)
    Pending,
    /// Migration has been applied
    Applied {
        /// When it was applied
        applied_at: DateTime<Utc>,
    },
}

impl MigrationStatus {
    pub fn is_applied(&self) -> bool {
        matches!(self, MigrationStatus::Applied { .. })
    }
}

/// A discovered migration paired with its applied state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationState {
    pub migration: Migration,
    pub status: MigrationStatus,
}

/// Result of one `up` or `down` run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRunResult {
    /// Direction the run executed in
    pub direction: MigrationDirection,
    /// Versions executed, in execution order
    pub versions: Vec<i64>,
    /// Number of discovered migrations that were not eligible for this run
    pub skipped_count: usize,
    /// Versions reverted with an empty down section
    pub irreversible: Vec<i64>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl MigrationRunResult {
    pub(crate) fn empty(direction: MigrationDirection, skipped_count: usize) -> Self {
        Self {
            direction,
            versions: Vec::new(),
            skipped_count,
            irreversible: Vec::new(),
            execution_time_ms: 0,
        }
    }

    /// Number of migrations that were executed
    pub fn executed_count(&self) -> usize {
        self.versions.len()
    }

    /// Whether the run changed nothing
    pub fn is_noop(&self) -> bool {
        self.versions.is_empty()
    }
}
