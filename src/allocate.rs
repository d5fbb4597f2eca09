//! Allocation engine.
//!
//! Distributes a newly available quantity of one part+color across the
//! sets that need it. Two modes:
//!
//! - **Direct**: a named set receives up to its remaining need; any excess
//!   is discarded.
//! - **Priority distribution**: sets are served in ascending priority
//!   order, each up to its remaining need, until the quantity runs out.
//!   Soft-completed sets are skipped. Moving nothing at all is an error.
//!
//! Each call is one transaction. The need rows, `parts.quantity`, and the
//! touched sets' completion change together or not at all, which keeps
//! `parts.quantity` equal to the sum of `quantity_allocated` for that part.

use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::completion::recompute;
use crate::error::{LedgerError, LedgerResult};
use crate::models::{validate_quantity, Allocation, PartKey, PartRef};
use crate::queries::{fetch_part, fetch_set};

/// Allocate `quantity` of `part`, to `target` if given, otherwise by priority.
pub async fn allocate(
    pool: &SqlitePool,
    part: &PartRef,
    quantity: i64,
    target: Option<&str>,
) -> LedgerResult<Vec<Allocation>> {
    validate_quantity(quantity)?;
    if let Some(set_id) = target {
        if set_id.trim().is_empty() {
            return Err(LedgerError::invalid("target set must not be empty"));
        }
    }

    let mut tx = pool.begin().await?;
    let result = allocate_in(&mut *tx, part, quantity, target).await;
    match result {
        Ok(allocations) => {
            tx.commit().await?;
            Ok(allocations)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            tracing::debug!(error = %e, "allocation rolled back");
            Err(e)
        }
    }
}

async fn allocate_in(
    conn: &mut SqliteConnection,
    part: &PartRef,
    quantity: i64,
    target: Option<&str>,
) -> LedgerResult<Vec<Allocation>> {
    let key = resolve_key(conn, part).await?;

    if fetch_part(conn, &key).await?.is_none() {
        return Err(LedgerError::not_found(format!(
            "part {} not found. Add a set containing this part first",
            key
        )));
    }

    match target {
        Some(set_id) => allocate_direct(conn, &key, quantity, set_id).await,
        None => allocate_by_priority(conn, &key, quantity).await,
    }
}

/// Turn an element id into its part+color; keys pass through.
async fn resolve_key(conn: &mut SqliteConnection, part: &PartRef) -> LedgerResult<PartKey> {
    let element_id = match part {
        PartRef::Key(key) => return Ok(key.clone()),
        PartRef::Element(element_id) => element_id,
    };

    let rows = sqlx::query("SELECT part_num, color_id FROM parts WHERE element_id = ?")
        .bind(element_id)
        .fetch_all(&mut *conn)
        .await?;

    match rows.as_slice() {
        [row] => Ok(PartKey::new(
            row.get::<String, _>("part_num"),
            row.get::<i64, _>("color_id"),
        )),
        [] => Err(LedgerError::not_found(format!(
            "element {} not found",
            element_id
        ))),
        _ => Err(LedgerError::not_found(format!(
            "element {} matches {} parts",
            element_id,
            rows.len()
        ))),
    }
}

async fn allocate_direct(
    conn: &mut SqliteConnection,
    key: &PartKey,
    quantity: i64,
    set_id: &str,
) -> LedgerResult<Vec<Allocation>> {
    let set = fetch_set(conn, set_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("set {} not found. Add the set first", set_id)))?;

    if set.soft_completed {
        return Err(LedgerError::conflict(format!(
            "set {} is marked complete. Unmark it before allocating",
            set_id
        )));
    }

    let need: Option<(i64, i64)> = sqlx::query_as(
        "SELECT quantity_needed, quantity_allocated FROM set_parts \
         WHERE set_id = ? AND part_num = ? AND color_id = ?",
    )
    .bind(set_id)
    .bind(&key.part_num)
    .bind(key.color_id)
    .fetch_optional(&mut *conn)
    .await?;

    let (needed, allocated) = need.ok_or_else(|| {
        LedgerError::conflict(format!("part {} is not used in set {}", key, set_id))
    })?;

    let still_needed = needed - allocated;
    if still_needed <= 0 {
        return Err(LedgerError::conflict(format!(
            "set {} already has enough of part {}",
            set_id, key
        )));
    }

    let amount = quantity.min(still_needed);
    add_to_need_row(conn, set_id, key, amount).await?;
    add_to_part_total(conn, key, amount).await?;
    let after = recompute(conn, set_id).await?;

    tracing::info!(set = set_id, part = %key, amount, discarded = quantity - amount, "direct allocation");

    Ok(vec![allocation(set.id, set.name, amount, set.completion, after)])
}

async fn allocate_by_priority(
    conn: &mut SqliteConnection,
    key: &PartKey,
    quantity: i64,
) -> LedgerResult<Vec<Allocation>> {
    let candidates = sqlx::query(
        r#"
        SELECT sp.set_id, s.name, s.completion, sp.quantity_needed, sp.quantity_allocated
        FROM set_parts sp
        JOIN sets s ON sp.set_id = s.id
        WHERE sp.part_num = ? AND sp.color_id = ? AND s.soft_completed = 0
        ORDER BY s.priority ASC
        "#,
    )
    .bind(&key.part_num)
    .bind(key.color_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut remaining = quantity;
    let mut total = 0i64;
    let mut allocations = Vec::new();

    for row in &candidates {
        if remaining <= 0 {
            break;
        }

        let needed: i64 = row.get("quantity_needed");
        let allocated: i64 = row.get("quantity_allocated");
        let still_needed = needed - allocated;
        if still_needed <= 0 {
            continue;
        }

        let set_id: String = row.get("set_id");
        let amount = remaining.min(still_needed);
        add_to_need_row(conn, &set_id, key, amount).await?;
        remaining -= amount;
        total += amount;

        let before: f64 = row.get("completion");
        let after = recompute(conn, &set_id).await?;
        tracing::debug!(set = %set_id, part = %key, amount, "priority allocation");
        allocations.push(allocation(set_id, row.get("name"), amount, before, after));
    }

    if total == 0 {
        return Err(LedgerError::conflict(format!(
            "part {} is not needed for any sets. {} parts not added",
            key, quantity
        )));
    }

    add_to_part_total(conn, key, total).await?;
    tracing::info!(part = %key, total, sets = allocations.len(), unused = remaining, "priority allocation complete");

    Ok(allocations)
}

fn allocation(set_id: String, set_name: String, amount: i64, before: f64, after: f64) -> Allocation {
    Allocation {
        set_id,
        set_name,
        allocated: amount,
        became_started: before <= 0.0 && after > 0.0,
        became_complete: before < 1.0 && after >= 1.0,
    }
}

async fn add_to_need_row(
    conn: &mut SqliteConnection,
    set_id: &str,
    key: &PartKey,
    amount: i64,
) -> LedgerResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE set_parts
        SET quantity_allocated = quantity_allocated + ?1
        WHERE set_id = ?2 AND part_num = ?3 AND color_id = ?4
          AND quantity_allocated + ?1 <= quantity_needed
        "#,
    )
    .bind(amount)
    .bind(set_id)
    .bind(&key.part_num)
    .bind(key.color_id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() != 1 {
        return Err(LedgerError::conflict(format!(
            "allocating {} of part {} would exceed the need of set {}",
            amount, key, set_id
        )));
    }
    Ok(())
}

async fn add_to_part_total(conn: &mut SqliteConnection, key: &PartKey, amount: i64) -> LedgerResult<()> {
    sqlx::query("UPDATE parts SET quantity = quantity + ? WHERE part_num = ? AND color_id = ?")
        .bind(amount)
        .bind(&key.part_num)
        .bind(key.color_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
