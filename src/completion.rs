//! Completion tracking for sets.
//!
//! A set's completion is the ratio of allocated to needed quantity summed
//! over its need rows. Soft-completing a set is a separate flag: it keeps
//! the ratio untouched and takes the set out of allocation until the next
//! [`recompute`] clears it.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::{LedgerError, LedgerResult};
use crate::models::SetRecord;
use crate::queries::fetch_set;

/// Recompute and store the completion of `set_id`, clearing soft-complete.
///
/// Runs on the caller's connection so it joins an open transaction.
pub async fn recompute(conn: &mut SqliteConnection, set_id: &str) -> LedgerResult<f64> {
    let (needed, allocated): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(quantity_needed), 0), COALESCE(SUM(quantity_allocated), 0)
        FROM set_parts
        WHERE set_id = ?
        "#,
    )
    .bind(set_id)
    .fetch_one(&mut *conn)
    .await?;

    let completion = completion_ratio(needed, allocated);

    sqlx::query("UPDATE sets SET completion = ?, soft_completed = 0 WHERE id = ?")
        .bind(completion)
        .bind(set_id)
        .execute(&mut *conn)
        .await?;

    Ok(completion)
}

pub(crate) fn completion_ratio(needed: i64, allocated: i64) -> f64 {
    if needed == 0 {
        0.0
    } else {
        allocated as f64 / needed as f64
    }
}

/// Mark a set done by hand, or clear the mark by recomputing its ratio.
pub async fn set_soft_completed(
    pool: &SqlitePool,
    set_id: &str,
    soft_completed: bool,
) -> LedgerResult<SetRecord> {
    let mut tx = pool.begin().await?;
    match toggle_in(&mut *tx, set_id, soft_completed).await {
        Ok(set) => {
            tx.commit().await?;
            tracing::info!(set_id, soft_completed, "soft-complete updated");
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

async fn toggle_in(
    conn: &mut SqliteConnection,
    set_id: &str,
    soft_completed: bool,
) -> LedgerResult<SetRecord> {
    if fetch_set(conn, set_id).await?.is_none() {
        return Err(LedgerError::not_found(format!("set {} not found", set_id)));
    }

    if soft_completed {
        sqlx::query("UPDATE sets SET soft_completed = 1 WHERE id = ?")
            .bind(set_id)
            .execute(&mut *conn)
            .await?;
    } else {
        recompute(conn, set_id).await?;
    }

    fetch_set(conn, set_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("set {} not found", set_id)))
}
