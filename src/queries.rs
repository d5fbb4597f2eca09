//! Read-only queries for the presentation layer.
//!
//! None of these mutate state; they list sets and set parts in the orders
//! the terminal views offer. The `fetch_*` helpers run on a borrowed
//! connection so the mutation paths can use them inside a transaction.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::LedgerResult;
use crate::models::{PartKey, PartRecord, SetPartRecord, SetRecord};

const SET_COLUMNS: &str = "id, name, priority, completion, soft_completed, created_at";

const SET_PART_COLUMNS: &str = "sp.set_id, sp.part_num, sp.color_id, p.name, p.element_id, \
    p.bricklink_id, sp.quantity_needed, sp.quantity_allocated";

/// Sort direction for set part listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }

    fn reversed(self) -> Self {
        match self {
            Direction::Asc => Direction::Desc,
            Direction::Desc => Direction::Asc,
        }
    }
}

/// Orderings offered by the set part view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetPartOrder {
    /// Storage order.
    Unsorted,
    PartNum(Direction),
    /// `Asc` follows ascending progress: rows with the most still needed lead.
    Remaining(Direction),
    Percent(Direction),
    /// Grouped by color, then part number; optionally one color only.
    Color(Option<i64>),
}

pub(crate) fn set_from_row(row: &SqliteRow) -> SetRecord {
    SetRecord {
        id: row.get("id"),
        name: row.get("name"),
        priority: row.get("priority"),
        completion: row.get("completion"),
        soft_completed: row.get::<i64, _>("soft_completed") != 0,
        created_at: row.get("created_at"),
    }
}

fn set_part_from_row(row: &SqliteRow) -> SetPartRecord {
    SetPartRecord {
        set_id: row.get("set_id"),
        part_num: row.get("part_num"),
        color_id: row.get("color_id"),
        name: row.get("name"),
        element_id: row.get("element_id"),
        bricklink_id: row.get("bricklink_id"),
        quantity_needed: row.get("quantity_needed"),
        quantity_allocated: row.get("quantity_allocated"),
    }
}

pub(crate) async fn fetch_set(
    conn: &mut SqliteConnection,
    set_id: &str,
) -> LedgerResult<Option<SetRecord>> {
    let row = sqlx::query(&format!("SELECT {} FROM sets WHERE id = ?", SET_COLUMNS))
        .bind(set_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.as_ref().map(set_from_row))
}

pub(crate) async fn fetch_part(
    conn: &mut SqliteConnection,
    key: &PartKey,
) -> LedgerResult<Option<PartRecord>> {
    let row = sqlx::query(
        "SELECT part_num, color_id, name, quantity, bricklink_id, element_id \
         FROM parts WHERE part_num = ? AND color_id = ?",
    )
    .bind(&key.part_num)
    .bind(key.color_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(|row| PartRecord {
        part_num: row.get("part_num"),
        color_id: row.get("color_id"),
        name: row.get("name"),
        quantity: row.get("quantity"),
        bricklink_id: row.get("bricklink_id"),
        element_id: row.get("element_id"),
    }))
}

pub async fn get_set(pool: &SqlitePool, set_id: &str) -> LedgerResult<Option<SetRecord>> {
    let mut conn = pool.acquire().await?;
    fetch_set(&mut conn, set_id).await
}

pub async fn get_part(pool: &SqlitePool, key: &PartKey) -> LedgerResult<Option<PartRecord>> {
    let mut conn = pool.acquire().await?;
    fetch_part(&mut conn, key).await
}

/// Sets whose id or name contains `search`, most complete first, then by
/// priority. Soft-completed sets sort as complete.
pub async fn list_sets(pool: &SqlitePool, search: Option<&str>) -> LedgerResult<Vec<SetRecord>> {
    let pattern = format!("%{}%", escape_like(search.unwrap_or("")));
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}
        FROM sets
        WHERE id LIKE ?1 ESCAPE '\' OR name LIKE ?1 ESCAPE '\'
        ORDER BY CASE WHEN soft_completed = 1 THEN 1.0 ELSE completion END DESC, priority ASC
        "#,
        SET_COLUMNS
    ))
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(set_from_row).collect())
}

/// Search text matches literally; `%` and `_` are not wildcards.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Every set ordered by priority.
pub async fn sets_by_priority(pool: &SqlitePool) -> LedgerResult<Vec<SetRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM sets ORDER BY priority ASC",
        SET_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(set_from_row).collect())
}

pub async fn set_parts(
    pool: &SqlitePool,
    set_id: &str,
    order: SetPartOrder,
) -> LedgerResult<Vec<SetPartRecord>> {
    let mut color_filter = None;
    let order_clause = match order {
        SetPartOrder::Unsorted => String::new(),
        SetPartOrder::PartNum(dir) => format!("ORDER BY sp.part_num {}", dir.sql()),
        SetPartOrder::Remaining(dir) => format!(
            "ORDER BY (sp.quantity_needed - sp.quantity_allocated) {}",
            dir.reversed().sql()
        ),
        SetPartOrder::Percent(dir) => format!(
            "ORDER BY CAST(sp.quantity_allocated AS REAL) / sp.quantity_needed {}",
            dir.sql()
        ),
        SetPartOrder::Color(Some(color_id)) => {
            color_filter = Some(color_id);
            String::new()
        }
        SetPartOrder::Color(None) => "ORDER BY sp.color_id ASC, sp.part_num ASC".to_string(),
    };

    let sql = format!(
        r#"
        SELECT {}
        FROM set_parts sp
        JOIN parts p ON sp.part_num = p.part_num AND sp.color_id = p.color_id
        WHERE sp.set_id = ?{}
        {}
        "#,
        SET_PART_COLUMNS,
        if color_filter.is_some() {
            " AND sp.color_id = ?"
        } else {
            ""
        },
        order_clause
    );

    let mut query = sqlx::query(&sql).bind(set_id);
    if let Some(color_id) = color_filter {
        query = query.bind(color_id);
    }
    let rows = query.fetch_all(pool).await?;

    Ok(rows.iter().map(set_part_from_row).collect())
}

/// Distinct colors used by a set, ascending.
pub async fn set_colors(pool: &SqlitePool, set_id: &str) -> LedgerResult<Vec<i64>> {
    let colors: Vec<i64> = sqlx::query_scalar(
        "SELECT DISTINCT color_id FROM set_parts WHERE set_id = ? ORDER BY color_id",
    )
    .bind(set_id)
    .fetch_all(pool)
    .await?;
    Ok(colors)
}
