//! Fixtures shared by the in-crate database tests.

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::config::Config;
use crate::{db, migrate};

pub fn test_config(tmp: &TempDir) -> Config {
    let config_content = format!(
        r#"
[db]
path = "{}"
"#,
        tmp.path().join("brick.sqlite").display()
    );
    toml::from_str(&config_content).unwrap()
}

/// Fresh migrated database in its own temp directory.
pub async fn test_pool() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let cfg = test_config(&tmp);
    let pool = db::connect(&cfg).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    (tmp, pool)
}

pub async fn seed_set(pool: &SqlitePool, id: &str, name: &str, priority: i64) {
    sqlx::query("INSERT INTO sets (id, name, priority, created_at) VALUES (?, ?, ?, 0)")
        .bind(id)
        .bind(name)
        .bind(priority)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn seed_part(pool: &SqlitePool, part_num: &str, color_id: i64, name: &str) {
    sqlx::query("INSERT INTO parts (part_num, color_id, name, quantity) VALUES (?, ?, ?, 0)")
        .bind(part_num)
        .bind(color_id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
}

/// Inserts the need row and keeps `parts.quantity` in step with `allocated`.
pub async fn seed_set_part(
    pool: &SqlitePool,
    set_id: &str,
    part_num: &str,
    color_id: i64,
    needed: i64,
    allocated: i64,
) {
    sqlx::query(
        "INSERT INTO set_parts (set_id, part_num, color_id, quantity_needed, quantity_allocated) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(set_id)
    .bind(part_num)
    .bind(color_id)
    .bind(needed)
    .bind(allocated)
    .execute(pool)
    .await
    .unwrap();

    sqlx::query("UPDATE parts SET quantity = quantity + ? WHERE part_num = ? AND color_id = ?")
        .bind(allocated)
        .bind(part_num)
        .bind(color_id)
        .execute(pool)
        .await
        .unwrap();
}
