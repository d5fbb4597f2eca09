//! Collection statistics.
//!
//! A quick summary of what is tracked: set and part counts, how much of
//! the total need has been allocated, and a per-set breakdown in priority
//! order. Used by `brick stats`.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;

/// Aggregate figures for the whole collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionStats {
    pub sets: i64,
    pub soft_completed: i64,
    pub distinct_parts: i64,
    pub total_needed: i64,
    pub total_allocated: i64,
    pub per_set: Vec<SetStats>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetStats {
    pub id: String,
    pub name: String,
    pub priority: i64,
    pub needed: i64,
    pub allocated: i64,
    pub soft_completed: bool,
}

pub async fn collect_stats(pool: &SqlitePool) -> Result<CollectionStats> {
    let sets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sets")
        .fetch_one(pool)
        .await?;

    let soft_completed: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sets WHERE soft_completed = 1")
            .fetch_one(pool)
            .await?;

    let distinct_parts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parts")
        .fetch_one(pool)
        .await?;

    let (total_needed, total_allocated): (i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(quantity_needed), 0), COALESCE(SUM(quantity_allocated), 0) FROM set_parts",
    )
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(
        r#"
        SELECT
            s.id,
            s.name,
            s.priority,
            s.soft_completed,
            COALESCE(SUM(sp.quantity_needed), 0) AS needed,
            COALESCE(SUM(sp.quantity_allocated), 0) AS allocated
        FROM sets s
        LEFT JOIN set_parts sp ON sp.set_id = s.id
        GROUP BY s.id
        ORDER BY s.priority ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let per_set = rows
        .iter()
        .map(|row| SetStats {
            id: row.get("id"),
            name: row.get("name"),
            priority: row.get("priority"),
            needed: row.get("needed"),
            allocated: row.get("allocated"),
            soft_completed: row.get::<i64, _>("soft_completed") != 0,
        })
        .collect();

    Ok(CollectionStats {
        sets,
        soft_completed,
        distinct_parts,
        total_needed,
        total_allocated,
        per_set,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Brick Harness — Collection Stats");
    println!("================================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!();
    println!("  Sets:        {} ({} marked complete)", stats.sets, stats.soft_completed);
    println!("  Parts:       {}", stats.distinct_parts);
    println!(
        "  Allocated:   {} / {} ({})",
        stats.total_allocated,
        stats.total_needed,
        format_percent(stats.total_allocated, stats.total_needed)
    );

    if !stats.per_set.is_empty() {
        println!();
        println!("  By set:");
        println!(
            "  {:>4}  {:<12} {:<32} {:>9} {:>9} {:>7}",
            "PRIO", "SET", "NAME", "NEEDED", "ALLOC", "DONE"
        );
        println!("  {}", "-".repeat(80));

        for s in &stats.per_set {
            let done = if s.soft_completed {
                "marked".to_string()
            } else {
                format_percent(s.allocated, s.needed)
            };
            println!(
                "  {:>4}  {:<12} {:<32} {:>9} {:>9} {:>7}",
                s.priority,
                s.id,
                truncate(&s.name, 32),
                s.needed,
                s.allocated,
                done
            );
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

pub fn format_percent(part: i64, whole: i64) -> String {
    if whole <= 0 {
        return "0%".to_string();
    }
    format!("{:.0}%", part as f64 * 100.0 / whole as f64)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
