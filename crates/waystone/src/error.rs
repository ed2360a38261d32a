//! Error types for the migration engine
//!
//! Every failure the engine can report is a variant of [`MigrationError`],
//! carrying enough context (file, version, statement position) to diagnose
//! the problem without re-running.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for migration operations
pub type MigrationResult<T> = Result<T, MigrationError>;

/// Errors that can occur while loading, validating or executing migrations
#[derive(Debug, Error)]
pub enum MigrationError {
    /// A file in the source directory does not follow the `{version}_{name}.sql` convention
    #[error("malformed migration source '{file}': {reason}")]
    MalformedSource { file: String, reason: String },

    /// The source directory or one of its files could not be read
    #[error("cannot read migration source {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two files claim the same version, or versions are out of order
    #[error("duplicate migration version: expected version {expected}, found {found}")]
    DuplicateVersion { expected: i64, found: i64 },

    /// A version was skipped in the sequence
    #[error("migration version gap: expected version {expected}, found {found}")]
    VersionGap { expected: i64, found: i64 },

    /// Reading or writing the applied-state table failed
    #[error("applied-state store error on table '{table}' while trying to {operation}: {source}")]
    StateStore {
        table: String,
        operation: String,
        #[source]
        source: sqlx::Error,
    },

    /// A single statement inside a migration failed; its transaction was rolled back
    #[error("migration {version} ({filename}) failed at statement {position}/{total}: {source}")]
    StatementExecution {
        version: i64,
        filename: String,
        position: usize,
        total: usize,
        #[source]
        source: sqlx::Error,
    },

    /// All statements succeeded but the transaction could not be committed
    #[error("migration {version} ({filename}) failed to commit: {source}")]
    Commit {
        version: i64,
        filename: String,
        #[source]
        source: sqlx::Error,
    },

    /// Rolling back past a migration without a down section is forbidden by configuration
    #[error("migration {version} ({filename}) has no down section and irreversible rollbacks are forbidden")]
    Irreversible { version: i64, filename: String },

    /// Another process holds the migration lock
    #[error("migration lock on '{table}' is held by {holder}")]
    LockUnavailable { table: String, holder: String },

    /// Invalid engine configuration
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MigrationError {
    /// Create a new malformed source error
    pub fn malformed<F: ToString, R: ToString>(file: F, reason: R) -> Self {
        Self::MalformedSource {
            file: file.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Create a new applied-state store error
    pub fn state_store<T: ToString, O: ToString>(table: T, operation: O, source: sqlx::Error) -> Self {
        Self::StateStore {
            table: table.to_string(),
            operation: operation.to_string(),
            source,
        }
    }

    /// Version of the migration this error is attributed to, if any
    pub fn version(&self) -> Option<i64> {
        match self {
            Self::StatementExecution { version, .. }
            | Self::Commit { version, .. }
            | Self::Irreversible { version, .. } => Some(*version),
            Self::DuplicateVersion { found, .. } | Self::VersionGap { found, .. } => Some(*found),
            _ => None,
        }
    }

    /// Whether the error was raised before any database write was attempted
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedSource { .. }
                | Self::SourceUnavailable { .. }
                | Self::DuplicateVersion { .. }
                | Self::VersionGap { .. }
                | Self::Configuration(_)
        )
    }
}
