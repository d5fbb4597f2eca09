//! Priority normalization.
//!
//! Priorities form a dense sequence `1..=N` across all sets: rank 1 is
//! served first by the allocation engine. Every path that changes a rank
//! goes through [`normalize`], which rewrites the sequence and touches only
//! the rows whose priority actually moved.

use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::{LedgerError, LedgerResult};
use crate::models::{validate_priority, SetRecord};
use crate::queries::fetch_set;

/// Request to place a set at a specific rank while normalizing.
#[derive(Debug, Clone, Copy)]
pub struct PriorityInsert<'a> {
    pub set_id: &'a str,
    pub priority: i64,
}

/// Renumber every set densely, optionally splicing one set at a requested
/// rank. Returns the next free priority (`N + 1`).
pub async fn normalize(pool: &SqlitePool, insert: Option<PriorityInsert<'_>>) -> LedgerResult<i64> {
    if let Some(ins) = insert {
        validate_priority(ins.priority)?;
    }

    let mut tx = pool.begin().await?;
    match normalize_in(&mut *tx, insert).await {
        Ok(next) => {
            tx.commit().await?;
            Ok(next)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

/// [`normalize`] on the caller's connection, inside its transaction.
pub(crate) async fn normalize_in(
    conn: &mut SqliteConnection,
    insert: Option<PriorityInsert<'_>>,
) -> LedgerResult<i64> {
    // Ties go to the most recently created set.
    let rows = sqlx::query(
        "SELECT id, priority FROM sets ORDER BY priority ASC, created_at DESC, rowid DESC",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut ranked: Vec<(String, i64)> = rows
        .iter()
        .map(|row| (row.get("id"), row.get("priority")))
        .collect();

    if let Some(ins) = insert {
        validate_priority(ins.priority)?;
        if let Some(pos) = ranked.iter().position(|(id, _)| id == ins.set_id) {
            let entry = ranked.remove(pos);
            let target = (ins.priority - 1).clamp(0, ranked.len() as i64) as usize;
            ranked.insert(target, entry);
        } else {
            tracing::warn!(set_id = ins.set_id, "priority insert for unknown set ignored");
        }
    }

    let mut moved = 0usize;
    for (index, (id, current)) in ranked.iter().enumerate() {
        let wanted = index as i64 + 1;
        if *current != wanted {
            sqlx::query("UPDATE sets SET priority = ? WHERE id = ?")
                .bind(wanted)
                .bind(id)
                .execute(&mut *conn)
                .await?;
            moved += 1;
        }
    }

    tracing::debug!(sets = ranked.len(), moved, "priorities normalized");
    Ok(ranked.len() as i64 + 1)
}

/// Move a set to `priority`, shifting the others to keep the order dense.
pub async fn set_priority(pool: &SqlitePool, set_id: &str, priority: i64) -> LedgerResult<SetRecord> {
    validate_priority(priority)?;

    let mut tx = pool.begin().await?;
    match reprioritize_in(&mut *tx, set_id, priority).await {
        Ok(set) => {
            tx.commit().await?;
            tracing::info!(set_id, priority = set.priority, "set priority changed");
            Ok(set)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

async fn reprioritize_in(
    conn: &mut SqliteConnection,
    set_id: &str,
    priority: i64,
) -> LedgerResult<SetRecord> {
    let not_found = || LedgerError::not_found(format!("set {} not found", set_id));

    let set = fetch_set(conn, set_id).await?.ok_or_else(not_found)?;
    if set.priority == priority {
        return Ok(set);
    }

    normalize_in(conn, Some(PriorityInsert { set_id, priority })).await?;
    fetch_set(conn, set_id).await?.ok_or_else(not_found)
}
