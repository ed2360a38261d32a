mod common;

use common::{applied_versions, memory_pool, table_exists, Project};
use waystone::backends::{DatabasePool, DatabaseRow};
use waystone::MigrationError;

#[tokio::test]
async fn test_missing_seeds_directory_is_empty_seed_set() {
    let project = Project::new();
    let pool = memory_pool().await;
    let seeds = project.migrator(&pool).seeds();

    let result = seeds.up().await.unwrap();

    assert!(result.is_noop());
    assert!(seeds.status().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_seeds_track_separately_from_migrations() {
    let project = Project::new();
    project
        .with_three_migrations()
        .seed(
            "1_default_users.sql",
            "INSERT INTO users (id, name) VALUES (1, 'admin');\n\
             INSERT INTO users (id, name) VALUES (2, 'guest');\n\
             -- +down\n\
             DELETE FROM users WHERE id IN (1, 2);",
        );
    let pool = memory_pool().await;
    let migrator = project.migrator(&pool);

    migrator.up().await.unwrap();
    let result = migrator.seeds().up().await.unwrap();

    assert_eq!(result.versions, vec![1]);
    assert_eq!(applied_versions(&pool, "waystone_seeds").await, vec![1]);
    assert_eq!(applied_versions(&pool, "waystone_migrations").await, vec![1, 2, 3]);

    let rows = pool.fetch_all("SELECT name FROM users ORDER BY id", &[]).await.unwrap();
    let names: Vec<String> = rows.iter().map(|r| r.get_string("name").unwrap()).collect();
    assert_eq!(names, vec!["admin", "guest"]);

    let reverted = migrator.seeds().down(0).await.unwrap();
    assert_eq!(reverted.versions, vec![1]);
    assert!(pool.fetch_all("SELECT id FROM users", &[]).await.unwrap().is_empty());
    assert!(table_exists(&pool, "users").await);
}

#[tokio::test]
async fn test_seed_sequence_is_validated() {
    let project = Project::new();
    project
        .seed("1_a.sql", "SELECT 1;")
        .seed("3_c.sql", "SELECT 3;");
    let pool = memory_pool().await;

    let err = project.migrator(&pool).seeds().up().await.unwrap_err();

    assert!(matches!(err, MigrationError::VersionGap { expected: 2, found: 3 }));
    assert!(!table_exists(&pool, "waystone_seeds").await);
}

#[tokio::test]
async fn test_create_seed_creates_directory() {
    let project = Project::new();
    let pool = memory_pool().await;

    let path = project
        .migrator(&pool)
        .seeds()
        .create_seed("demo data")
        .unwrap();

    assert_eq!(path.file_name().unwrap(), "1_demo_data.sql");
    assert!(project.seeds_dir().join("1_demo_data.sql").exists());
}
