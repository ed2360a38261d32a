//! Sequence validation
//!
//! Loaded migrations must form the sequence 1, 2, 3, ... with no gaps and no
//! duplicates. The check runs on freshly loaded definitions before every run.

use super::definitions::Migration;
use crate::error::{MigrationError, MigrationResult};

/// Confirm that `migrations` (sorted by version) is contiguous from 1
pub fn validate_sequence(migrations: &[Migration]) -> MigrationResult<()> {
    for (index, migration) in migrations.iter().enumerate() {
        let expected = index as i64 + 1;
        let found = migration.version;

        if found < expected {
            return Err(MigrationError::DuplicateVersion { expected, found });
        }
        if found > expected {
            return Err(MigrationError::VersionGap { expected, found });
        }
    }

    tracing::debug!(count = migrations.len(), "migration sequence validated");
    Ok(())
}
