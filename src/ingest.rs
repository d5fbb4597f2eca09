//! Set ingestion.
//!
//! Adding a set is a resumable loop driven by the caller:
//!
//! ```text
//! IngestSession::new(set, priority)
//!        │
//!        ▼
//!   ingest_set() ──▶ NeedsDecision(pending) ──▶ caller asks the user,
//!        ▲                                      session.decide(key, ..)
//!        └──────────────────────────────────────────────┘
//!        │
//!        ▼
//!   Ingested(set)        one transaction: set row, parts, need rows
//! ```
//!
//! The session owns the catalog data fetched on the first attempt and the
//! decisions made so far, so resuming never refetches the catalog or asks
//! about a settled part again. Nothing touches the database until every
//! non-spare part is either resolved or skipped; dropping the session
//! cancels the ingestion with no side effects.

use std::collections::BTreeMap;

use sqlx::{SqliteConnection, SqlitePool};

use crate::catalog::{Catalog, CatalogPart, CatalogSet};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{validate_priority, validate_set_number, PartKey, SetRecord};
use crate::priority::{normalize_in, PriorityInsert};
use crate::queries::fetch_set;
use crate::resolver::{resolve_element, Resolution};

/// What to do with a part whose element was ambiguous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartDecision {
    Element(String),
    /// Leave the part out of the set entirely.
    Skip,
}

/// One in-flight attempt to add a set.
#[derive(Debug, Clone)]
pub struct IngestSession {
    set_number: String,
    priority: Option<i64>,
    set: Option<CatalogSet>,
    parts: Option<Vec<CatalogPart>>,
    decisions: BTreeMap<PartKey, PartDecision>,
}

impl IngestSession {
    pub fn new(set_number: impl Into<String>, priority: Option<i64>) -> Self {
        Self {
            set_number: set_number.into(),
            priority,
            set: None,
            parts: None,
            decisions: BTreeMap::new(),
        }
    }

    /// Record a decision for a part. Later decisions for the same key win.
    pub fn decide(&mut self, key: PartKey, decision: PartDecision) {
        self.decisions.insert(key, decision);
    }

    pub fn decisions(&self) -> &BTreeMap<PartKey, PartDecision> {
        &self.decisions
    }
}

/// A part ingestion cannot settle without the user.
#[derive(Debug, Clone)]
pub struct PendingDecision {
    pub set: CatalogSet,
    pub part: CatalogPart,
    /// Timely candidates first. Empty when only skipping is possible.
    pub candidates: Vec<String>,
    pub timely: Vec<String>,
    /// Decisions settled before this one.
    pub resolved: BTreeMap<PartKey, PartDecision>,
}

impl PendingDecision {
    pub fn key(&self) -> PartKey {
        PartKey::new(&self.part.part_num, self.part.color_id)
    }

    /// The candidate a prompt should preselect.
    pub fn default_choice(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }

    pub fn is_timely(&self, element_id: &str) -> bool {
        self.timely.iter().any(|e| e == element_id)
    }
}

#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Ingested(SetRecord),
    NeedsDecision(PendingDecision),
}

/// A need row ready to persist, merged across duplicate catalog lines.
#[derive(Debug, Clone, PartialEq)]
struct NeedRow {
    key: PartKey,
    name: String,
    quantity: i64,
    element_id: String,
    bricklink_id: Option<String>,
}

/// Run (or resume) ingestion for the session's set.
pub async fn ingest_set(
    pool: &SqlitePool,
    catalog: &dyn Catalog,
    session: &mut IngestSession,
) -> LedgerResult<IngestOutcome> {
    validate_set_number(&session.set_number)?;
    if let Some(priority) = session.priority {
        validate_priority(priority)?;
    }

    if set_exists(pool, &session.set_number).await? {
        return Err(already_exists(&session.set_number));
    }

    if session.set.is_none() {
        let set = catalog
            .set_details(&session.set_number)
            .await
            .map_err(|e| LedgerError::ExternalService(format!("{:#}", e)))?;
        session.set = Some(set);
    }
    if session.parts.is_none() {
        let parts = catalog
            .set_parts(&session.set_number)
            .await
            .map_err(|e| LedgerError::ExternalService(format!("{:#}", e)))?;
        if parts.is_empty() {
            return Err(LedgerError::not_found(format!(
                "no parts found for set {}",
                session.set_number
            )));
        }
        tracing::info!(set = %session.set_number, lines = parts.len(), "catalog inventory fetched");
        session.parts = Some(parts);
    }

    let (set, parts) = match (&session.set, &session.parts) {
        (Some(set), Some(parts)) => (set, parts),
        _ => return Err(LedgerError::ExternalService("catalog data missing".into())),
    };

    let known = concrete_elements(parts);
    for part in parts.iter().filter(|p| !p.is_spare) {
        let key = PartKey::new(&part.part_num, part.color_id);
        if known.contains_key(&key) || session.decisions.contains_key(&key) {
            continue;
        }

        match resolve_element(catalog, part, set).await? {
            Resolution::Element(element_id) => {
                session
                    .decisions
                    .insert(key, PartDecision::Element(element_id));
            }
            Resolution::NeedsDecision { candidates, timely } => {
                tracing::info!(set = %set.set_num, part = %key, candidates = candidates.len(), "ingestion waiting on a decision");
                return Ok(IngestOutcome::NeedsDecision(PendingDecision {
                    set: set.clone(),
                    part: part.clone(),
                    candidates,
                    timely,
                    resolved: session.decisions.clone(),
                }));
            }
        }
    }

    let rows = need_rows(parts, &session.decisions);
    let name = if set.name.trim().is_empty() {
        format!("Set {}", session.set_number)
    } else {
        set.name.clone()
    };

    let mut tx = pool.begin().await?;
    match persist_in(&mut *tx, &session.set_number, &name, session.priority, &rows).await {
        Ok(record) => {
            tx.commit().await?;
            tracing::info!(
                set = %record.id,
                priority = record.priority,
                parts = rows.len(),
                "set ingested"
            );
            Ok(IngestOutcome::Ingested(record))
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

/// First catalog element per part+color among the non-spare lines.
fn concrete_elements(parts: &[CatalogPart]) -> BTreeMap<PartKey, String> {
    let mut known = BTreeMap::new();
    for part in parts.iter().filter(|p| !p.is_spare) {
        if let Some(element_id) = &part.element_id {
            known
                .entry(PartKey::new(&part.part_num, part.color_id))
                .or_insert_with(|| element_id.clone());
        }
    }
    known
}

/// Merge the inventory into one row per part+color, dropping spares and
/// skipped parts.
///
/// A line with its own element always counts. Decisions only apply to lines
/// without one, so skipping drops just those lines.
fn need_rows(parts: &[CatalogPart], decisions: &BTreeMap<PartKey, PartDecision>) -> Vec<NeedRow> {
    let known = concrete_elements(parts);
    let mut rows: BTreeMap<PartKey, NeedRow> = BTreeMap::new();

    for part in parts.iter().filter(|p| !p.is_spare) {
        let key = PartKey::new(&part.part_num, part.color_id);
        let element_id = match (&part.element_id, decisions.get(&key)) {
            (Some(element_id), _) => element_id.clone(),
            (None, Some(PartDecision::Skip)) => continue,
            (None, Some(PartDecision::Element(element_id))) => element_id.clone(),
            (None, None) => match known.get(&key) {
                Some(element_id) => element_id.clone(),
                None => continue,
            },
        };

        rows.entry(key.clone())
            .and_modify(|row| row.quantity += part.quantity)
            .or_insert_with(|| NeedRow {
                key,
                name: part.name.clone(),
                quantity: part.quantity,
                element_id,
                bricklink_id: if part.bricklink_ids.is_empty() {
                    None
                } else {
                    Some(part.bricklink_ids.join(","))
                },
            });
    }

    rows.into_values().filter(|row| row.quantity > 0).collect()
}

async fn persist_in(
    conn: &mut SqliteConnection,
    set_number: &str,
    name: &str,
    priority: Option<i64>,
    rows: &[NeedRow],
) -> LedgerResult<SetRecord> {
    if fetch_set(conn, set_number).await?.is_some() {
        return Err(already_exists(set_number));
    }

    let initial_priority = match priority {
        Some(p) => p,
        None => normalize_in(conn, None).await?,
    };

    sqlx::query("INSERT INTO sets (id, name, priority, created_at) VALUES (?, ?, ?, ?)")
        .bind(set_number)
        .bind(name)
        .bind(initial_priority)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *conn)
        .await?;

    if let Some(requested) = priority {
        normalize_in(
            conn,
            Some(PriorityInsert {
                set_id: set_number,
                priority: requested,
            }),
        )
        .await?;
    }

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO parts (part_num, color_id, name, quantity, bricklink_id, element_id)
            VALUES (?, ?, ?, 0, ?, ?)
            ON CONFLICT(part_num, color_id) DO UPDATE SET
                element_id = COALESCE(parts.element_id, excluded.element_id),
                bricklink_id = COALESCE(parts.bricklink_id, excluded.bricklink_id)
            "#,
        )
        .bind(&row.key.part_num)
        .bind(row.key.color_id)
        .bind(&row.name)
        .bind(&row.bricklink_id)
        .bind(&row.element_id)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "INSERT INTO set_parts (set_id, part_num, color_id, quantity_needed, quantity_allocated) \
             VALUES (?, ?, ?, ?, 0)",
        )
        .bind(set_number)
        .bind(&row.key.part_num)
        .bind(row.key.color_id)
        .bind(row.quantity)
        .execute(&mut *conn)
        .await?;
    }

    fetch_set(conn, set_number)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("set {} not found", set_number)))
}

async fn set_exists(pool: &SqlitePool, set_number: &str) -> LedgerResult<bool> {
    let exists: bool = sqlx::query_scalar("SELECT COUNT(*) > 0 FROM sets WHERE id = ?")
        .bind(set_number)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

fn already_exists(set_number: &str) -> LedgerError {
    LedgerError::conflict(format!("set {} already exists", set_number))
}
