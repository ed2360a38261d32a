//! # waystone: versioned SQL schema migrations
//!
//! Tracks the evolution of a database schema through an ordered sequence of
//! `{version}_{name}.sql` files, applies pending changes forward or reverts
//! them to a target version, and records applied versions in a table inside
//! the database itself.
//!
//! ```rust,no_run
//! use waystone::{Migrator, MigratorConfig};
//!
//! # async fn run() -> waystone::MigrationResult<()> {
//! let config = MigratorConfig::new().with_migrations_dir("db/migrations");
//! let migrator = Migrator::connect("postgres://localhost/app", config).await?;
//!
//! migrator.up().await?;
//! migrator.down(3).await?;
//! # Ok(())
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod error;
pub mod migrations;
pub mod migrator;
pub mod seeding;

pub use backends::{connect, DatabasePool, PostgresPool, SqlDialect, SqlitePool};
pub use config::{IrreversiblePolicy, LockConfig, MigratorConfig};
pub use error::{MigrationError, MigrationResult};
pub use migrations::{
    AppliedRecord, Migration, MigrationDirection, MigrationRunResult, MigrationState,
    MigrationStatus,
};
pub use migrator::Migrator;
pub use seeding::Seeder;
