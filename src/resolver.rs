//! Element resolution for catalog parts that lack a concrete variant.
//!
//! The catalog is asked for every element produced in the part's color
//! across its whole mold family. One candidate resolves on its own; zero or
//! several need a decision from the user, with candidates produced in the
//! set's release year listed first.

use crate::catalog::{Catalog, CatalogPart, CatalogSet};
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Element(String),
    /// Empty `candidates` means the only choice is to skip the part.
    NeedsDecision {
        candidates: Vec<String>,
        /// Subset of `candidates` produced in the set's release year.
        timely: Vec<String>,
    },
}

pub async fn resolve_element(
    catalog: &dyn Catalog,
    part: &CatalogPart,
    set: &CatalogSet,
) -> LedgerResult<Resolution> {
    let mut family: Vec<&str> = vec![part.part_num.as_str()];
    for mold in &part.mold_variants {
        if !family.contains(&mold.as_str()) {
            family.push(mold.as_str());
        }
    }

    let mut timely: Vec<String> = Vec::new();
    let mut others: Vec<String> = Vec::new();

    for mold in family {
        let variants = catalog.part_color_variants(mold).await.map_err(|e| {
            LedgerError::ExternalService(format!(
                "failed to resolve element for part {}: {:#}",
                part.part_num, e
            ))
        })?;

        for variant in variants.iter().filter(|v| v.color_id == part.color_id) {
            let in_year = variant.produced_in(set.year);
            for element_id in &variant.element_ids {
                if timely.contains(element_id) {
                    continue;
                }
                if in_year {
                    others.retain(|e| e != element_id);
                    timely.push(element_id.clone());
                } else if !others.contains(element_id) {
                    others.push(element_id.clone());
                }
            }
        }
    }

    if timely.len() + others.len() == 1 {
        let only = timely.pop().or_else(|| others.pop());
        if let Some(element_id) = only {
            tracing::debug!(part = %part.part_num, %element_id, "element resolved automatically");
            return Ok(Resolution::Element(element_id));
        }
    }

    let candidates: Vec<String> = timely.iter().chain(others.iter()).cloned().collect();
    tracing::debug!(
        part = %part.part_num,
        candidates = candidates.len(),
        timely = timely.len(),
        "element needs a decision"
    );
    Ok(Resolution::NeedsDecision { candidates, timely })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColorVariant, SnapshotCatalog};

    fn part(part_num: &str, color_id: i64, molds: &[&str]) -> CatalogPart {
        CatalogPart {
            part_num: part_num.to_string(),
            name: "Test part".to_string(),
            color_id,
            quantity: 1,
            is_spare: false,
            element_id: None,
            bricklink_ids: vec![],
            mold_variants: molds.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn variant(color_id: i64, ids: &[&str], from: i32, to: i32) -> ColorVariant {
        ColorVariant {
            color_id,
            element_ids: ids.iter().map(|i| i.to_string()).collect(),
            year_from: from,
            year_to: to,
        }
    }

    fn set(year: i32) -> CatalogSet {
        CatalogSet {
            set_num: "100-1".to_string(),
            name: "Test set".to_string(),
            year,
        }
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let catalog = SnapshotCatalog::default();
        let res = resolve_element(&catalog, &part("3001", 4, &[]), &set(2020))
            .await
            .unwrap();
        assert_eq!(
            res,
            Resolution::NeedsDecision {
                candidates: vec![],
                timely: vec![]
            }
        );
    }

    #[tokio::test]
    async fn test_single_candidate_resolves() {
        let catalog = SnapshotCatalog::default().with_variants(
            "3001",
            vec![variant(4, &["300121"], 1990, 2000), variant(1, &["300123"], 1990, 2024)],
        );
        let res = resolve_element(&catalog, &part("3001", 4, &[]), &set(2020))
            .await
            .unwrap();
        assert_eq!(res, Resolution::Element("300121".to_string()));
    }

    #[tokio::test]
    async fn test_multiple_candidates_timely_first() {
        let catalog = SnapshotCatalog::default()
            .with_variants("3001", vec![variant(4, &["old"], 1980, 1990)])
            .with_variants("3001b", vec![variant(4, &["new"], 2015, 2024)]);
        let res = resolve_element(&catalog, &part("3001", 4, &["3001b"]), &set(2020))
            .await
            .unwrap();
        assert_eq!(
            res,
            Resolution::NeedsDecision {
                candidates: vec!["new".to_string(), "old".to_string()],
                timely: vec!["new".to_string()],
            }
        );
    }

    #[tokio::test]
    async fn test_same_element_across_molds_counts_once() {
        let catalog = SnapshotCatalog::default()
            .with_variants("3001", vec![variant(4, &["300121"], 1980, 1990)])
            .with_variants("3001b", vec![variant(4, &["300121"], 2015, 2024)]);
        let res = resolve_element(&catalog, &part("3001", 4, &["3001b", "3001"]), &set(2020))
            .await
            .unwrap();
        assert_eq!(res, Resolution::Element("300121".to_string()));
    }
}
