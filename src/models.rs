//! Core data models used throughout Brick Harness.
//!
//! These types mirror the three persisted tables (`sets`, `parts`,
//! `set_parts`) and the values that flow between the allocation engine,
//! set ingestion, and the presentation layer.

use std::fmt;

use crate::error::{LedgerError, LedgerResult};

/// Canonical identity of a part: mold number plus color.
///
/// Element ids are set-specific variants and never used as identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartKey {
    pub part_num: String,
    pub color_id: i64,
}

impl PartKey {
    pub fn new(part_num: impl Into<String>, color_id: i64) -> Self {
        Self {
            part_num: part_num.into(),
            color_id,
        }
    }
}

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (color: {})", self.part_num, self.color_id)
    }
}

/// How a caller names the part it is allocating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartRef {
    Key(PartKey),
    /// A concrete element id, looked up in the `parts` table.
    Element(String),
}

impl PartRef {
    /// Build a key reference from raw text input, rejecting non-numeric colors.
    pub fn parse_key(part_num: &str, color_id: &str) -> LedgerResult<Self> {
        let part_num = part_num.trim();
        if part_num.is_empty() {
            return Err(LedgerError::invalid("part number must not be empty"));
        }
        let color_id: i64 = color_id
            .trim()
            .parse()
            .map_err(|_| LedgerError::invalid(format!("invalid color id: {}", color_id)))?;
        Ok(PartRef::Key(PartKey::new(part_num, color_id)))
    }

    pub fn element(element_id: &str) -> LedgerResult<Self> {
        let element_id = element_id.trim();
        if element_id.is_empty() {
            return Err(LedgerError::invalid("element id must not be empty"));
        }
        Ok(PartRef::Element(element_id.to_string()))
    }
}

/// A row of the `sets` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRecord {
    pub id: String,
    pub name: String,
    pub priority: i64,
    /// Allocated/needed ratio in `[0, 1]`.
    pub completion: f64,
    /// Manually marked done; excluded from allocation.
    pub soft_completed: bool,
    pub created_at: i64,
}

impl SetRecord {
    /// Completion as shown to users: soft-completed sets read as done.
    pub fn display_completion(&self) -> f64 {
        if self.soft_completed {
            1.0
        } else {
            self.completion
        }
    }
}

/// A row of the `parts` table.
#[derive(Debug, Clone, PartialEq)]
pub struct PartRecord {
    pub part_num: String,
    pub color_id: i64,
    pub name: String,
    /// Total allocated to date across every set.
    pub quantity: i64,
    pub bricklink_id: Option<String>,
    pub element_id: Option<String>,
}

/// A `set_parts` row joined with its part's display data.
#[derive(Debug, Clone, PartialEq)]
pub struct SetPartRecord {
    pub set_id: String,
    pub part_num: String,
    pub color_id: i64,
    pub name: String,
    pub element_id: Option<String>,
    pub bricklink_id: Option<String>,
    pub quantity_needed: i64,
    pub quantity_allocated: i64,
}

impl SetPartRecord {
    pub fn remaining(&self) -> i64 {
        self.quantity_needed - self.quantity_allocated
    }
}

/// One set's share of an allocation call.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub set_id: String,
    pub set_name: String,
    pub allocated: i64,
    /// The set went from 0% to above 0%.
    pub became_started: bool,
    /// The set went from below 100% to 100%.
    pub became_complete: bool,
}

/// Accepts `12345` or `12345-1`.
pub fn validate_set_number(set_number: &str) -> LedgerResult<()> {
    let (base, suffix) = match set_number.split_once('-') {
        Some((base, suffix)) => (base, Some(suffix)),
        None => (set_number, None),
    };
    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if all_digits(base) && suffix.map_or(true, all_digits) {
        Ok(())
    } else {
        Err(LedgerError::invalid(format!(
            "invalid set number: {}",
            set_number
        )))
    }
}

pub fn validate_quantity(quantity: i64) -> LedgerResult<()> {
    if quantity <= 0 {
        return Err(LedgerError::invalid("quantity must be greater than 0"));
    }
    Ok(())
}

pub fn validate_priority(priority: i64) -> LedgerResult<()> {
    if priority <= 0 {
        return Err(LedgerError::invalid("priority must be greater than 0"));
    }
    Ok(())
}
