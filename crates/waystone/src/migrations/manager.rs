//! Migration Manager - File system operations for migrations
//!
//! Handles creating, loading, and parsing migration files from the filesystem.
//! Files are named `{version}_{name}.sql`; their content is split at the first
//! `-- +down` marker into the forward and reverse change-sets.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use super::definitions::Migration;
use crate::error::{MigrationError, MigrationResult};

/// Marker separating the up section from the down section
pub const DOWN_MARKER: &str = "-- +down";

const FILENAME_CONVENTION: &str = "expected file name of the form {version}_{name}.sql";

/// Migration manager for creating and loading migrations from one directory
#[derive(Debug, Clone)]
pub struct MigrationManager {
    dir: PathBuf,
    allow_missing_dir: bool,
}

impl MigrationManager {
    /// Create a manager reading from `dir`; a missing directory is an error
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            allow_missing_dir: false,
        }
    }

    /// Treat a missing directory as an empty set of migrations
    pub fn allow_missing_dir(mut self) -> Self {
        self.allow_missing_dir = true;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load all migration files from the directory, sorted by version
    ///
    /// Every regular file must be a `.sql` file following the naming
    /// convention. Directories are skipped. Duplicate versions are kept;
    /// they are reported by sequence validation.
    pub fn load_migrations(&self) -> MigrationResult<Vec<Migration>> {
        if self.allow_missing_dir && !self.dir.exists() {
            tracing::debug!(dir = %self.dir.display(), "source directory missing, nothing to load");
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.dir).map_err(|source| MigrationError::SourceUnavailable {
            path: self.dir.clone(),
            source,
        })?;

        let mut migrations = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| MigrationError::SourceUnavailable {
                path: self.dir.clone(),
                source,
            })?;

            let path = entry.path();
            if path.is_dir() {
                continue;
            }

            migrations.push(parse_migration_file(&path)?);
        }

        migrations.sort_by_key(|m| m.version);
        tracing::debug!(
            dir = %self.dir.display(),
            count = migrations.len(),
            "loaded migration definitions"
        );
        Ok(migrations)
    }

    /// Create a new migration file numbered after the highest existing version
    pub fn create_migration(&self, name: &str) -> MigrationResult<PathBuf> {
        let slug = name.trim().replace(char::is_whitespace, "_").to_lowercase();
        if slug.is_empty() {
            return Err(MigrationError::Configuration(
                "migration name cannot be empty".to_string(),
            ));
        }
        if slug.contains(|c: char| c == '/' || c == '\\') {
            return Err(MigrationError::Configuration(format!(
                "migration name '{}' cannot contain a path separator",
                name
            )));
        }

        fs::create_dir_all(&self.dir).map_err(|source| MigrationError::SourceUnavailable {
            path: self.dir.clone(),
            source,
        })?;

        let next_version = self
            .load_migrations()?
            .last()
            .map_or(1, |m| m.version + 1);

        let filename = format!("{}_{}.sql", next_version, slug);
        let path = self.dir.join(&filename);

        fs::write(&path, migration_template(name)).map_err(|source| {
            MigrationError::SourceUnavailable {
                path: path.clone(),
                source,
            }
        })?;

        tracing::info!(file = %path.display(), version = next_version, "created migration");
        Ok(path)
    }
}

/// Parse one migration file into a Migration
pub fn parse_migration_file(path: &Path) -> MigrationResult<Migration> {
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| MigrationError::malformed(path.display(), "file name is not valid UTF-8"))?
        .to_string();

    let (version, name) = parse_filename(&filename)?;

    let content = fs::read_to_string(path).map_err(|source| MigrationError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    let (up_sql, down_sql) = parse_migration_content(&content);

    Ok(Migration {
        version,
        name,
        filename,
        up_sql,
        down_sql,
    })
}

/// Split a `{version}_{name}.sql` file name into its version and name
pub fn parse_filename(filename: &str) -> MigrationResult<(i64, String)> {
    let stem = filename
        .strip_suffix(".sql")
        .ok_or_else(|| MigrationError::malformed(filename, "not a .sql file"))?;

    let (version, name) = stem
        .split_once('_')
        .ok_or_else(|| MigrationError::malformed(filename, FILENAME_CONVENTION))?;

    let version = version
        .parse::<u64>()
        .ok()
        .and_then(|v| i64::try_from(v).ok())
        .ok_or_else(|| {
            MigrationError::malformed(
                filename,
                format!("'{}' is not a valid version number, {}", version, FILENAME_CONVENTION),
            )
        })?;

    Ok((version, name.to_string()))
}

/// Split file content into trimmed (up, down) sections at the first down marker
pub fn parse_migration_content(content: &str) -> (String, String) {
    match content.split_once(DOWN_MARKER) {
        Some((up, down)) => (up.trim().to_string(), down.trim().to_string()),
        None => (content.trim().to_string(), String::new()),
    }
}

fn migration_template(name: &str) -> String {
    format!(
        "-- Migration: {}\n\
         -- Created: {}\n\n\n\
         {}\n\n",
        name,
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        DOWN_MARKER
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_parse_filename() {
        assert_eq!(parse_filename("1_init.sql").unwrap(), (1, "init".to_string()));
        assert_eq!(
            parse_filename("12_create_users_table.sql").unwrap(),
            (12, "create_users_table".to_string())
        );
        assert_eq!(parse_filename("003_pad.sql").unwrap(), (3, "pad".to_string()));
    }

    #[test]
    fn test_parse_filename_rejects_bad_names() {
        for bad in ["init.sql", "1.sql", "one_init.sql", "-1_init.sql", "1_init.txt", "README"] {
            let err = parse_filename(bad).unwrap_err();
            assert!(
                matches!(err, MigrationError::MalformedSource { ref file, .. } if file == bad),
                "{} should be malformed, got {:?}",
                bad,
                err
            );
        }
    }

    #[test]
    fn test_parse_content_splits_at_first_marker() {
        let (up, down) = parse_migration_content(
            "\nCREATE TABLE a (id INTEGER);\n-- +down\nDROP TABLE a;\n-- +down\nextra\n",
        );
        assert_eq!(up, "CREATE TABLE a (id INTEGER);");
        assert_eq!(down, "DROP TABLE a;\n-- +down\nextra");
    }

    #[test]
    fn test_parse_content_without_marker_is_irreversible() {
        let (up, down) = parse_migration_content("  CREATE TABLE a (id INTEGER);  \n");
        assert_eq!(up, "CREATE TABLE a (id INTEGER);");
        assert!(down.is_empty());
    }

    #[test]
    fn test_load_migrations_sorted_and_skips_directories() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "2_add_email.sql", "ALTER TABLE users ADD COLUMN email TEXT;");
        write(&temp_dir, "10_late.sql", "SELECT 1;");
        write(
            &temp_dir,
            "1_create_users.sql",
            "CREATE TABLE users (id INTEGER);\n-- +down\nDROP TABLE users;",
        );
        fs::create_dir(temp_dir.path().join("archive")).unwrap();

        let manager = MigrationManager::new(temp_dir.path());
        let migrations = manager.load_migrations().unwrap();

        let versions: Vec<i64> = migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2, 10]);
        assert_eq!(migrations[0].name, "create_users");
        assert_eq!(migrations[0].filename, "1_create_users.sql");
        assert_eq!(migrations[0].down_sql, "DROP TABLE users;");
        assert!(!migrations[1].is_reversible());
    }

    #[test]
    fn test_load_migrations_keeps_duplicate_versions() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "1_a.sql", "SELECT 1;");
        write(&temp_dir, "1_b.sql", "SELECT 2;");

        let migrations = MigrationManager::new(temp_dir.path()).load_migrations().unwrap();
        assert_eq!(migrations.len(), 2);
    }

    #[test]
    fn test_load_migrations_rejects_foreign_files() {
        let temp_dir = TempDir::new().unwrap();
        write(&temp_dir, "1_init.sql", "SELECT 1;");
        write(&temp_dir, "notes.txt", "hello");

        let err = MigrationManager::new(temp_dir.path()).load_migrations().unwrap_err();
        assert!(matches!(err, MigrationError::MalformedSource { ref file, .. } if file == "notes.txt"));
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");

        let err = MigrationManager::new(&missing).load_migrations().unwrap_err();
        assert!(matches!(err, MigrationError::SourceUnavailable { .. }));

        let loaded = MigrationManager::new(&missing)
            .allow_missing_dir()
            .load_migrations()
            .unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_create_migration_numbers_sequentially() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("migrations");
        let manager = MigrationManager::new(&dir);

        let first = manager.create_migration("Create Users Table").unwrap();
        assert_eq!(first.file_name().unwrap(), "1_create_users_table.sql");

        let second = manager.create_migration("add_email").unwrap();
        assert_eq!(second.file_name().unwrap(), "2_add_email.sql");

        let content = fs::read_to_string(&first).unwrap();
        assert!(content.contains("-- Migration: Create Users Table"));
        assert!(content.contains(DOWN_MARKER));

        let migrations = manager.load_migrations().unwrap();
        assert_eq!(migrations.len(), 2);
        assert!(migrations[0].down_sql.is_empty());
    }

    #[test]
    fn test_create_migration_rejects_empty_name() {
        let temp_dir = TempDir::new().unwrap();
        let manager = MigrationManager::new(temp_dir.path());
        assert!(manager.create_migration("   ").is_err());
    }

    #[test]
    fn test_create_migration_rejects_path_separators() {
        let temp_dir = TempDir::new().unwrap();
        let manager = MigrationManager::new(temp_dir.path().join("migrations"));

        for name in ["../../escaped", "nested/name", "win\\name"] {
            let err = manager.create_migration(name).unwrap_err();
            assert!(
                matches!(err, MigrationError::Configuration(_)),
                "{} should be rejected, got {:?}",
                name,
                err
            );
        }
        assert!(!temp_dir.path().join("migrations").exists());
    }
}
