//! Migration System
//!
//! Loading, validation, and transactional execution of versioned SQL
//! change-sets, tracked in an applied-state table inside the database.

pub mod definitions;
pub mod lock;
pub mod manager;
pub mod rollback;
pub mod runner;
pub mod state;
pub mod statements;
pub mod validation;

pub use definitions::*;
pub use lock::{LockGuard, MigrationLock};
pub use manager::{parse_migration_content, parse_migration_file, MigrationManager, DOWN_MARKER};
pub use runner::MigrationRunner;
pub use state::AppliedStateStore;
pub use statements::split_sql_statements;
pub use validation::validate_sequence;
