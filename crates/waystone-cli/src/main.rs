mod commands;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use waystone::config::{
    DEFAULT_MIGRATIONS_DIR, DEFAULT_MIGRATIONS_TABLE, DEFAULT_SEEDS_DIR, DEFAULT_SEEDS_TABLE,
};
use waystone::{IrreversiblePolicy, LockConfig, MigratorConfig};

#[derive(Parser, Debug)]
#[command(name = "waystone")]
#[command(about = "Versioned SQL schema migrations")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Database URL (postgres://... or sqlite://...)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Directory holding {version}_{name}.sql migration files
    #[arg(long, env = "WAYSTONE_MIGRATIONS_DIR", default_value = DEFAULT_MIGRATIONS_DIR, global = true)]
    pub migrations_dir: String,

    /// Table recording applied migrations
    #[arg(long, env = "WAYSTONE_MIGRATIONS_TABLE", default_value = DEFAULT_MIGRATIONS_TABLE, global = true)]
    pub migrations_table: String,

    /// Directory holding seed files
    #[arg(long, env = "WAYSTONE_SEEDS_DIR", default_value = DEFAULT_SEEDS_DIR, global = true)]
    pub seeds_dir: String,

    /// Table recording applied seeds
    #[arg(long, env = "WAYSTONE_SEEDS_TABLE", default_value = DEFAULT_SEEDS_TABLE, global = true)]
    pub seeds_table: String,

    /// Refuse to roll back past migrations without a down section
    #[arg(long, global = true)]
    pub forbid_irreversible: bool,

    /// Skip the cross-process migration lock
    #[arg(long, global = true)]
    pub no_lock: bool,

    /// Seconds to wait for a lock held by another process
    #[arg(long, default_value_t = 30, global = true)]
    pub lock_timeout: u64,
}

impl EngineArgs {
    pub fn migrator_config(&self) -> MigratorConfig {
        let policy = if self.forbid_irreversible {
            IrreversiblePolicy::Forbid
        } else {
            IrreversiblePolicy::Warn
        };

        MigratorConfig::new()
            .with_migrations_dir(&self.migrations_dir)
            .with_migrations_table(self.migrations_table.clone())
            .with_seeds_dir(&self.seeds_dir)
            .with_seeds_table(self.seeds_table.clone())
            .with_irreversible_policy(policy)
            .with_lock(LockConfig {
                enabled: !self.no_lock,
                timeout_seconds: self.lock_timeout,
                ..LockConfig::default()
            })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply all pending migrations
    Up,

    /// Roll back applied migrations above a target version
    Down {
        /// Version to roll back to (0 reverts everything)
        #[arg(long, short)]
        target: i64,
    },

    /// Show applied and pending migrations
    Status,

    /// Create a new migration file
    Create {
        /// Migration name
        name: String,
    },

    /// Remove a migration lock left behind by a crashed process
    Unlock,

    /// Seed data management
    Seed {
        #[command(subcommand)]
        seed_command: SeedCommands,
    },
}

#[derive(Subcommand, Debug)]
enum SeedCommands {
    /// Apply all pending seeds
    Up,

    /// Roll back applied seeds above a target version
    Down {
        #[arg(long, short)]
        target: i64,
    },

    /// Show applied and pending seeds
    Status,

    /// Create a new seed file
    Create {
        name: String,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let engine = &cli.engine;
    match cli.command {
        Commands::Up => commands::migrate::up(engine).await,
        Commands::Down { target } => commands::migrate::down(engine, target).await,
        Commands::Status => commands::migrate::status(engine).await,
        Commands::Create { name } => commands::migrate::create(engine, &name),
        Commands::Unlock => commands::migrate::unlock(engine).await,
        Commands::Seed { seed_command } => match seed_command {
            SeedCommands::Up => commands::seed::up(engine).await,
            SeedCommands::Down { target } => commands::seed::down(engine, target).await,
            SeedCommands::Status => commands::seed::status(engine).await,
            SeedCommands::Create { name } => commands::seed::create(engine, &name),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults_match_library_defaults() {
        let cli = Cli::try_parse_from(["waystone", "up"]).unwrap();
        let config = cli.engine.migrator_config();

        assert!(matches!(cli.command, Commands::Up));
        assert_eq!(config.migrations_table, MigratorConfig::default().migrations_table);
        assert_eq!(config.seeds_table, MigratorConfig::default().seeds_table);
        assert_eq!(config.irreversible_policy, IrreversiblePolicy::Warn);
        assert!(config.lock.enabled);
    }

    #[test]
    fn test_down_with_options() {
        let cli = Cli::try_parse_from([
            "waystone",
            "--database-url",
            "sqlite://app.db",
            "down",
            "--target",
            "2",
            "--migrations-dir",
            "db/migrations",
            "--forbid-irreversible",
            "--no-lock",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Down { target: 2 }));
        assert_eq!(cli.engine.database_url.as_deref(), Some("sqlite://app.db"));

        let config = cli.engine.migrator_config();
        assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
        assert_eq!(config.irreversible_policy, IrreversiblePolicy::Forbid);
        assert!(!config.lock.enabled);
    }

    #[test]
    fn test_seed_subcommands() {
        let cli = Cli::try_parse_from(["waystone", "seed", "create", "demo"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Seed { seed_command: SeedCommands::Create { ref name } } if name == "demo"
        ));
    }

    #[test]
    fn test_down_requires_target() {
        assert!(Cli::try_parse_from(["waystone", "down"]).is_err());
    }
}
