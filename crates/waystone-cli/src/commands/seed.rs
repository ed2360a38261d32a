use waystone::migrations::MigrationManager;

use super::{connect, print_run, print_status};
use crate::EngineArgs;

pub async fn up(engine: &EngineArgs) -> anyhow::Result<()> {
    let result = connect(engine).await?.seeds().up().await?;
    print_run("seeds", &result);
    Ok(())
}

pub async fn down(engine: &EngineArgs, target: i64) -> anyhow::Result<()> {
    let result = connect(engine).await?.seeds().down(target).await?;
    print_run("seeds", &result);
    Ok(())
}

pub async fn status(engine: &EngineArgs) -> anyhow::Result<()> {
    let states = connect(engine).await?.seeds().status().await?;
    print_status("seeds", &states);
    Ok(())
}

pub fn create(engine: &EngineArgs, name: &str) -> anyhow::Result<()> {
    let path = MigrationManager::new(&engine.seeds_dir).create_migration(name)?;
    println!("Created seed: {}", path.display());
    Ok(())
}
