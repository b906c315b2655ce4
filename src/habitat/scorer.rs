//! Habitat Inference Scorer
//!
//! Ranks candidate habitats from the species observed at a site.
//!
//! **Per species, per habitat** (each component counted at most once):
//! - name keyword hit: +1.0
//! - order/family exactly matches a taxonomic indicator: +2.0
//! - functional group matches an expected group: +1.0
//!
//! **Confidence** = score / MAX_POSSIBLE_SCORE, clamped to [0, 1]. The
//! maximum is reached once `SATURATION_SPECIES` species match on all three
//! components. Zero-score habitats are dropped.
//!
//! Pure and deterministic: no I/O, ties broken by habitat order.

use super::tables::{HabitatProfile, HABITAT_PROFILES};
use crate::models::{HabitatInfo, HabitatType, SpeciesRecord, TaxonomicLineage};
use rustc_hash::FxHashMap;

pub const KEYWORD_WEIGHT: f64 = 1.0;
pub const TAXONOMY_BONUS: f64 = 2.0;
pub const FUNCTIONAL_GROUP_BONUS: f64 = 1.0;
pub const SATURATION_SPECIES: f64 = 5.0;
pub const MAX_POSSIBLE_SCORE: f64 =
    SATURATION_SPECIES * (KEYWORD_WEIGHT + TAXONOMY_BONUS + FUNCTIONAL_GROUP_BONUS);

/// Per-habitat evidence breakdown
#[derive(Debug, Clone, PartialEq)]
pub struct HabitatScore {
    pub habitat: HabitatType,
    pub score: f64,
    pub keyword_hits: usize,
    pub taxonomy_hits: usize,
    pub functional_hits: usize,
}

impl HabitatScore {
    pub fn confidence(&self) -> f64 {
        (self.score / MAX_POSSIBLE_SCORE).clamp(0.0, 1.0)
    }
}

/// Score every habitat, highest first. Zero-score habitats are omitted.
///
/// `classifications` maps taxon id → lineage; species without an id or
/// lineage simply get no taxonomy bonus.
pub fn score_habitats(
    species: &[SpeciesRecord],
    classifications: Option<&FxHashMap<u64, TaxonomicLineage>>,
) -> Vec<HabitatScore> {
    let mut scores: Vec<HabitatScore> = HABITAT_PROFILES
        .iter()
        .map(|profile| score_profile(profile, species, classifications))
        .filter(|s| s.score > 0.0)
        .collect();

    // Stable sort keeps table order on ties
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

/// Ranked habitat list for a characterization (primary habitat first)
pub fn infer_habitats(
    species: &[SpeciesRecord],
    classifications: Option<&FxHashMap<u64, TaxonomicLineage>>,
) -> Vec<HabitatInfo> {
    score_habitats(species, classifications)
        .into_iter()
        .map(|s| HabitatInfo {
            habitat: s.habitat,
            name: s.habitat.display_name().to_string(),
            extent_km2: None,
            confidence: s.confidence(),
        })
        .collect()
}

fn score_profile(
    profile: &HabitatProfile,
    species: &[SpeciesRecord],
    classifications: Option<&FxHashMap<u64, TaxonomicLineage>>,
) -> HabitatScore {
    let mut result = HabitatScore {
        habitat: profile.habitat,
        score: 0.0,
        keyword_hits: 0,
        taxonomy_hits: 0,
        functional_hits: 0,
    };

    for sp in species {
        let name = sp.scientific_name.to_lowercase();
        // Trailing space lets keywords like "uca " match genus-only names too
        let padded = format!("{} ", name);
        if profile.name_keywords.iter().any(|kw| padded.contains(kw)) {
            result.score += KEYWORD_WEIGHT;
            result.keyword_hits += 1;
        }

        let lineage = sp
            .taxon_id
            .and_then(|id| classifications.and_then(|c| c.get(&id)));
        if let Some(lineage) = lineage {
            if lineage_matches(lineage, profile.taxonomic_indicators) {
                result.score += TAXONOMY_BONUS;
                result.taxonomy_hits += 1;
            }
        }

        if let Some(group) = &sp.functional_group {
            if functional_group_matches(group, profile.functional_groups) {
                result.score += FUNCTIONAL_GROUP_BONUS;
                result.functional_hits += 1;
            }
        }
    }

    result
}

/// Whole-value match on the lowercased group, or on any segment of a
/// hierarchical value such as `plankton > zooplankton`.
fn functional_group_matches(group: &str, expected: &[&str]) -> bool {
    let group = group.trim().to_lowercase();
    expected.iter().any(|g| {
        group == *g || group.split('>').any(|segment| segment.trim() == *g)
    })
}

fn lineage_matches(lineage: &TaxonomicLineage, indicators: &[&str]) -> bool {
    [&lineage.order, &lineage.family]
        .into_iter()
        .flatten()
        .any(|rank| indicators.iter().any(|ind| rank.eq_ignore_ascii_case(ind)))
}
