//! Parts catalog collaborator.
//!
//! Set ingestion needs three things from a catalog: a set's metadata, its
//! inventory, and the element variants a part is produced in per color.
//! [`Catalog`] is the seam; [`SnapshotCatalog`] serves it from a JSON
//! document so the CLI and tests run without a network.
//!
//! # Snapshot format
//!
//! ```json
//! {
//!   "sets": {
//!     "10696-1": {
//!       "name": "Medium Creative Brick Box",
//!       "year": 2015,
//!       "parts": [
//!         { "part_num": "3001", "name": "Brick 2 x 4", "color_id": 4,
//!           "quantity": 6, "element_id": "300121" }
//!       ]
//!     }
//!   },
//!   "part_colors": {
//!     "3001": [ { "color_id": 4, "element_ids": ["300121"], "year_from": 1958, "year_to": 2024 } ]
//!   },
//!   "colors": { "4": "Red" }
//! }
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Set metadata as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSet {
    pub set_num: String,
    pub name: String,
    pub year: i32,
}

/// One inventory line of a set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogPart {
    pub part_num: String,
    pub name: String,
    pub color_id: i64,
    pub quantity: i64,
    #[serde(default)]
    pub is_spare: bool,
    /// Concrete orderable variant, when the catalog knows it.
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub bricklink_ids: Vec<String>,
    /// Other part numbers in the same mold family.
    #[serde(default)]
    pub mold_variants: Vec<String>,
}

/// Elements one part is produced in for one color, with production years.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColorVariant {
    pub color_id: i64,
    pub element_ids: Vec<String>,
    pub year_from: i32,
    pub year_to: i32,
}

impl ColorVariant {
    pub fn produced_in(&self, year: i32) -> bool {
        self.year_from <= year && year <= self.year_to
    }
}

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn set_details(&self, set_number: &str) -> Result<CatalogSet>;

    async fn set_parts(&self, set_number: &str) -> Result<Vec<CatalogPart>>;

    async fn part_color_variants(&self, part_num: &str) -> Result<Vec<ColorVariant>>;

    /// Display name of a color. Not used by any invariant.
    fn color_name(&self, _color_id: i64) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub sets: HashMap<String, SnapshotSet>,
    #[serde(default)]
    pub part_colors: HashMap<String, Vec<ColorVariant>>,
    #[serde(default)]
    pub colors: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotSet {
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub parts: Vec<CatalogPart>,
}

/// Catalog served from an in-memory [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotCatalog {
    snapshot: Snapshot,
    set_fetches: AtomicUsize,
}

impl SnapshotCatalog {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            set_fetches: AtomicUsize::new(0),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(json).with_context(|| "Failed to parse catalog snapshot")?;
        Ok(Self::new(snapshot))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog snapshot: {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn with_set(mut self, set_num: &str, name: &str, year: i32, parts: Vec<CatalogPart>) -> Self {
        self.snapshot.sets.insert(
            set_num.to_string(),
            SnapshotSet {
                name: name.to_string(),
                year,
                parts,
            },
        );
        self
    }

    pub fn with_variants(mut self, part_num: &str, variants: Vec<ColorVariant>) -> Self {
        self.snapshot
            .part_colors
            .insert(part_num.to_string(), variants);
        self
    }

    /// Number of `set_parts` calls served so far.
    pub fn set_fetches(&self) -> usize {
        self.set_fetches.load(Ordering::SeqCst)
    }

    fn find_set(&self, set_number: &str) -> Result<(&String, &SnapshotSet)> {
        match self.snapshot.sets.get_key_value(set_number) {
            Some(found) => Ok(found),
            None => bail!("set {} not found in catalog", set_number),
        }
    }
}

#[async_trait]
impl Catalog for SnapshotCatalog {
    async fn set_details(&self, set_number: &str) -> Result<CatalogSet> {
        let (set_num, set) = self.find_set(set_number)?;
        Ok(CatalogSet {
            set_num: set_num.clone(),
            name: set.name.clone(),
            year: set.year,
        })
    }

    async fn set_parts(&self, set_number: &str) -> Result<Vec<CatalogPart>> {
        self.set_fetches.fetch_add(1, Ordering::SeqCst);
        let (_, set) = self.find_set(set_number)?;
        Ok(set.parts.clone())
    }

    async fn part_color_variants(&self, part_num: &str) -> Result<Vec<ColorVariant>> {
        Ok(self
            .snapshot
            .part_colors
            .get(part_num)
            .cloned()
            .unwrap_or_default())
    }

    fn color_name(&self, color_id: i64) -> Option<String> {
        self.snapshot.colors.get(&color_id.to_string()).cloned()
    }
}
