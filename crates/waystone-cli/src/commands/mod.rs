pub mod migrate;
pub mod seed;

use anyhow::Context;
use waystone::{MigrationRunResult, MigrationState, MigrationStatus, Migrator};

use crate::EngineArgs;

pub async fn connect(engine: &EngineArgs) -> anyhow::Result<Migrator> {
    let url = engine
        .database_url
        .as_deref()
        .context("no database URL given; pass --database-url or set DATABASE_URL")?;

    tracing::debug!(migrations_dir = %engine.migrations_dir, "connecting to database");
    let migrator = Migrator::connect(url, engine.migrator_config()).await?;
    Ok(migrator)
}

pub fn print_run(kind: &str, result: &MigrationRunResult) {
    if result.is_noop() {
        println!("No {} to run", kind);
        return;
    }

    println!(
        "Ran {} {} {} in {}ms: {:?}",
        result.executed_count(),
        kind,
        result.direction,
        result.execution_time_ms,
        result.versions
    );
    if !result.irreversible.is_empty() {
        println!(
            "Recorded as reverted without a down section: {:?}",
            result.irreversible
        );
    }
}

pub fn print_status(kind: &str, states: &[MigrationState]) {
    if states.is_empty() {
        println!("No {} found", kind);
        return;
    }

    println!("{:<10} {:<40} {}", "VERSION", "NAME", "STATUS");
    for state in states {
        let status = match &state.status {
            MigrationStatus::Applied { applied_at } => {
                format!("applied {}", applied_at.format("%Y-%m-%d %H:%M:%S UTC"))
            }
            MigrationStatus::Pending => "pending".to_string(),
        };
        println!(
            "{:<10} {:<40} {}",
            state.migration.version, state.migration.name, status
        );
    }
}
