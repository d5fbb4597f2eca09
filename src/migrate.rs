use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create every table and index on an already open pool. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // Create sets table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            priority INTEGER NOT NULL,
            completion REAL NOT NULL DEFAULT 0,
            soft_completed INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create parts table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parts (
            part_num TEXT NOT NULL,
            color_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            quantity INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
            bricklink_id TEXT,
            element_id TEXT,
            PRIMARY KEY (part_num, color_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create set_parts table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS set_parts (
            set_id TEXT NOT NULL,
            part_num TEXT NOT NULL,
            color_id INTEGER NOT NULL,
            quantity_needed INTEGER NOT NULL CHECK (quantity_needed > 0),
            quantity_allocated INTEGER NOT NULL DEFAULT 0
                CHECK (quantity_allocated >= 0 AND quantity_allocated <= quantity_needed),
            PRIMARY KEY (set_id, part_num, color_id),
            FOREIGN KEY (set_id) REFERENCES sets(id),
            FOREIGN KEY (part_num, color_id) REFERENCES parts(part_num, color_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sets_priority ON sets(priority)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_parts_element_id ON parts(element_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_set_parts_part ON set_parts(part_num, color_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
