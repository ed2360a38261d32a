#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use waystone::backends::{DatabaseRow, DatabaseValue};
use waystone::{DatabasePool, LockConfig, Migrator, MigratorConfig, SqlitePool};

/// Fresh in-memory database shared by every call through the returned pool
pub async fn memory_pool() -> Arc<dyn DatabasePool> {
    Arc::new(SqlitePool::in_memory().await.expect("in-memory sqlite"))
}

pub fn write_file(dir: &Path, name: &str, content: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), content).unwrap();
}

/// Temporary project with `migrations/` and `seeds/` directories
pub struct Project {
    pub root: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        fs::create_dir_all(root.path().join("migrations")).unwrap();
        Self { root }
    }

    pub fn migrations_dir(&self) -> std::path::PathBuf {
        self.root.path().join("migrations")
    }

    pub fn seeds_dir(&self) -> std::path::PathBuf {
        self.root.path().join("seeds")
    }

    pub fn migration(&self, name: &str, content: &str) -> &Self {
        write_file(&self.migrations_dir(), name, content);
        self
    }

    pub fn seed(&self, name: &str, content: &str) -> &Self {
        write_file(&self.seeds_dir(), name, content);
        self
    }

    pub fn config(&self) -> MigratorConfig {
        MigratorConfig::new()
            .with_migrations_dir(self.migrations_dir())
            .with_seeds_dir(self.seeds_dir())
            .with_lock(LockConfig {
                enabled: true,
                timeout_seconds: 0,
                poll_interval_ms: 10,
            })
    }

    pub fn migrator(&self, pool: &Arc<dyn DatabasePool>) -> Migrator {
        Migrator::new(pool.clone(), self.config()).unwrap()
    }

    /// Three dependent migrations: users, an email column, and a posts table
    pub fn with_three_migrations(&self) -> &Self {
        self.migration(
            "1_create_users.sql",
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);\n\
             -- +down\n\
             DROP TABLE users;",
        )
        .migration(
            "2_create_profiles.sql",
            "CREATE TABLE profiles (user_id INTEGER NOT NULL REFERENCES users (id), bio TEXT);\n\
             CREATE INDEX profiles_user_id ON profiles (user_id);\n\
             -- +down\n\
             DROP INDEX profiles_user_id;\n\
             DROP TABLE profiles;",
        )
        .migration(
            "3_create_posts.sql",
            "-- Posts belong to users\n\
             CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER NOT NULL REFERENCES users (id));\n\
             -- +down\n\
             DROP TABLE posts;",
        )
    }
}

pub async fn table_exists(pool: &Arc<dyn DatabasePool>, name: &str) -> bool {
    let rows = pool
        .fetch_all(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            &[DatabaseValue::from(name)],
        )
        .await
        .unwrap();
    !rows.is_empty()
}

pub async fn applied_versions(pool: &Arc<dyn DatabasePool>, table: &str) -> Vec<i64> {
    if !table_exists(pool, table).await {
        return Vec::new();
    }
    let rows = pool
        .fetch_all(&format!("SELECT version FROM {} ORDER BY version", table), &[])
        .await
        .unwrap();
    rows.iter().map(|row| row.get_i64("version").unwrap()).collect()
}
