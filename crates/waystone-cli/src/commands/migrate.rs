use waystone::migrations::MigrationManager;

use super::{connect, print_run, print_status};
use crate::EngineArgs;

pub async fn up(engine: &EngineArgs) -> anyhow::Result<()> {
    let result = connect(engine).await?.up().await?;
    print_run("migrations", &result);
    Ok(())
}

pub async fn down(engine: &EngineArgs, target: i64) -> anyhow::Result<()> {
    let result = connect(engine).await?.down(target).await?;
    print_run("migrations", &result);
    Ok(())
}

pub async fn status(engine: &EngineArgs) -> anyhow::Result<()> {
    let migrator = connect(engine).await?;
    let states = migrator.status().await?;
    print_status("migrations", &states);
    println!("Current version: {}", migrator.current_version().await?);
    Ok(())
}

pub fn create(engine: &EngineArgs, name: &str) -> anyhow::Result<()> {
    let path = MigrationManager::new(&engine.migrations_dir).create_migration(name)?;
    println!("Created migration: {}", path.display());
    Ok(())
}

pub async fn unlock(engine: &EngineArgs) -> anyhow::Result<()> {
    if connect(engine).await?.force_unlock().await? {
        println!("Removed migration lock");
    } else {
        println!("No migration lock was held");
    }
    Ok(())
}
