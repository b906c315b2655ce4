//! Site Characterizer
//!
//! Turns a site name into a tiered [`SiteCharacterization`]. Steps run
//! strictly in order, one source at a time:
//!
//! | Step | Tier | Source |
//! |---|---|---|
//! | Locate | all | caller hints, then gazetteer for missing fields |
//! | Populate species | Silver+ | occurrence + taxonomy |
//! | Characterize habitat | Silver+ | habitat scorer |
//! | Estimate services | Silver+ | axiom index |
//! | Score & rate | Silver+ | NEOLI + rating rules |
//!
//! Source failures never abort a run: the step is logged as degraded and
//! leaves its fields empty. Only invalid caller input is an error.

use crate::clients::{
    best_match, interpret_attributes, AreaFilter, GazetteerSource, OccurrenceRecord,
    OccurrenceSource, TaxonomySource,
};
use crate::config::{CharacterizerSettings, ValuationConfig};
use crate::error::ValidationError;
use crate::habitat::infer_habitats;
use crate::models::{
    CharacterizationTier, NeoliAssessment, NeoliCriteria, PipelineStep, SiteCharacterization,
    SpeciesRecord, StepOutcome, TaxonomicLineage,
};
use crate::valuation::{AxiomIndex, EsvEstimator};
use chrono::Datelike;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// NEOLI "old": strictly more than this many years since designation
pub const OLD_AGE_YEARS: i32 = 10;
/// NEOLI "large": strictly more than this area
pub const LARGE_AREA_KM2: f64 = 100.0;

pub mod data_sources {
    pub const CALLER: &str = "caller";
    pub const GAZETTEER: &str = "gazetteer";
    pub const OCCURRENCE: &str = "occurrence";
    pub const TAXONOMY: &str = "taxonomy";
    pub const AXIOM_REGISTRY: &str = "axiom_registry";
}

/// Caller-supplied metadata; takes precedence over gazetteer values
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteHints {
    pub country: Option<String>,
    /// (latitude, longitude)
    pub coordinates: Option<(f64, f64)>,
    pub area_km2: Option<f64>,
    pub designation_year: Option<i32>,
    /// WKT boundary; occurrence search uses it instead of the site name
    pub boundary_wkt: Option<String>,
}

/// Derive NEOLI criteria from governance metadata alone.
///
/// No-take and enforced are assumed whenever a designation year is known;
/// isolation cannot be inferred and is always false.
pub fn neoli_from_metadata(
    designation_year: Option<i32>,
    area_km2: Option<f64>,
    reference_year: i32,
) -> NeoliCriteria {
    let designated = designation_year.is_some();
    NeoliCriteria {
        no_take: designated,
        enforced: designated,
        old: designation_year.is_some_and(|y| reference_year - y > OLD_AGE_YEARS),
        large: area_km2.is_some_and(|a| a > LARGE_AREA_KM2),
        isolated: false,
    }
}

/// Asset rating from NEOLI score and total ESV
pub fn asset_rating(neoli_score: u8, esv_usd: Option<f64>) -> &'static str {
    let has_value = esv_usd.is_some_and(|v| v > 0.0);
    match neoli_score {
        s if s >= 4 && has_value => "AA",
        s if s >= 3 => "A",
        s if s >= 2 => "BBB",
        _ => "BB",
    }
}

pub struct SiteCharacterizer<'a> {
    occurrence: Arc<dyn OccurrenceSource>,
    taxonomy: Arc<dyn TaxonomySource>,
    gazetteer: Arc<dyn GazetteerSource>,
    estimator: EsvEstimator<'a>,
    settings: CharacterizerSettings,
    reference_year: i32,
}

impl<'a> SiteCharacterizer<'a> {
    pub fn new(
        occurrence: Arc<dyn OccurrenceSource>,
        taxonomy: Arc<dyn TaxonomySource>,
        gazetteer: Arc<dyn GazetteerSource>,
        index: &'a AxiomIndex,
        config: &ValuationConfig,
    ) -> Self {
        Self {
            occurrence,
            taxonomy,
            gazetteer,
            estimator: EsvEstimator::new(index, config.esv),
            settings: config.characterizer,
            reference_year: chrono::Utc::now().year(),
        }
    }

    /// Pin "current year" used for the NEOLI age criterion
    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = year;
        self
    }

    /// Characterize a site up to `tier`.
    ///
    /// # Errors
    /// Only for invalid input (empty name, out-of-range hints). Upstream
    /// failures are recorded in the provenance log instead.
    pub fn characterize(
        &self,
        name: &str,
        tier: CharacterizationTier,
        hints: &SiteHints,
    ) -> Result<SiteCharacterization, ValidationError> {
        let mut record = SiteCharacterization::new(name.trim())?;
        apply_hints(&mut record, hints)?;

        info!("Characterizing '{}' to {} tier", record.canonical_name, tier);
        self.locate(&mut record);
        if tier == CharacterizationTier::Bronze {
            for step in [
                PipelineStep::PopulateSpecies,
                PipelineStep::CharacterizeHabitat,
                PipelineStep::EstimateServices,
                PipelineStep::ScoreAndRate,
            ] {
                record.record_step(step, StepOutcome::Skipped, "bronze tier");
            }
        }
        self.enrich(&mut record, tier, hints.boundary_wkt.as_deref())?;

        Ok(record)
    }

    /// Raise an existing record to `tier`. Never removes populated fields;
    /// a tier at or below the current one is a no-op.
    pub fn enrich(
        &self,
        record: &mut SiteCharacterization,
        tier: CharacterizationTier,
        boundary_wkt: Option<&str>,
    ) -> Result<(), ValidationError> {
        if tier <= record.tier {
            return Ok(());
        }

        // Gold adds no steps; its extra requirements are checked by the registry
        if record.tier < CharacterizationTier::Silver {
            let lineages = self.populate_species(record, boundary_wkt);
            self.characterize_habitat(record, &lineages);
            self.estimate_services(record);
            self.score_and_rate(record)?;
        }

        record.tier = tier;
        info!(
            "'{}' at {}: {} species, {} habitats, ESV {:?}",
            record.canonical_name,
            record.tier,
            record.species.len(),
            record.habitats.len(),
            record.estimated_esv_usd
        );
        Ok(())
    }

    fn locate(&self, record: &mut SiteCharacterization) {
        let complete = record.country.is_some()
            && record.coordinates().is_some()
            && record.area_km2().is_some()
            && record.designation_year.is_some();
        if complete {
            record.record_step(
                PipelineStep::Locate,
                StepOutcome::Completed,
                "caller supplied all fields",
            );
            return;
        }

        let candidates = match self.gazetteer.search_by_name(&record.canonical_name) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Locate '{}' degraded: {}", record.canonical_name, e);
                record.record_step(PipelineStep::Locate, StepOutcome::Degraded, e.to_string());
                return;
            }
        };
        record.add_data_source(data_sources::GAZETTEER);

        let Some(hit) = best_match(&candidates, &record.canonical_name) else {
            record.record_step(PipelineStep::Locate, StepOutcome::Completed, "no gazetteer match");
            return;
        };

        let mut filled = Vec::new();
        if record.country.is_none() {
            if let Some(country) = &hit.country {
                record.country = Some(country.clone());
                filled.push("country");
            }
        }
        if record.coordinates().is_none() {
            if let (Some(lat), Some(lon)) = (hit.latitude, hit.longitude) {
                match record.set_coordinates(lat, lon) {
                    Ok(()) => filled.push("coordinates"),
                    Err(e) => debug!("Ignoring gazetteer coordinates: {}", e),
                }
            }
        }
        if record.area_km2().is_none() {
            if let Some(area) = hit.area_km2 {
                match record.set_area_km2(area) {
                    Ok(()) => filled.push("area"),
                    Err(e) => debug!("Ignoring gazetteer area: {}", e),
                }
            }
        }
        if record.designation_year.is_none() && hit.year.is_some() {
            record.designation_year = hit.year;
            filled.push("designation_year");
        }

        let detail = format!("matched '{}', filled [{}]", hit.name, filled.join(", "));
        debug!("Locate '{}': {}", record.canonical_name, detail);
        record.record_step(PipelineStep::Locate, StepOutcome::Completed, detail);
    }

    /// Returns lineages keyed by taxon id for the habitat scorer
    fn populate_species(
        &self,
        record: &mut SiteCharacterization,
        boundary_wkt: Option<&str>,
    ) -> FxHashMap<u64, TaxonomicLineage> {
        let mut lineages = FxHashMap::default();

        let filter = match boundary_wkt {
            Some(wkt) => AreaFilter::Geometry(wkt.to_string()),
            None => AreaFilter::AreaName(record.canonical_name.clone()),
        };
        let occurrences = match self
            .occurrence
            .search_occurrences(&filter, self.settings.occurrence_page_size)
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Species lookup for '{}' degraded: {}", record.canonical_name, e);
                record.record_step(
                    PipelineStep::PopulateSpecies,
                    StepOutcome::Degraded,
                    e.to_string(),
                );
                return lineages;
            }
        };
        record.add_data_source(data_sources::OCCURRENCE);

        let mut species = dedupe_occurrences(occurrences);
        let mut failures = 0usize;
        let mut enriched = 0usize;

        let identified = species.iter_mut().filter_map(|sp| sp.taxon_id.map(|id| (id, sp)));
        for (taxon_id, sp) in identified.take(self.settings.max_species_enrichment) {
            let mut ok = true;

            match self.taxonomy.lookup(taxon_id) {
                Ok(Some(taxon)) => {
                    if sp.conservation_status.is_none() {
                        sp.conservation_status = taxon.conservation_status;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("Taxon {} lookup failed: {}", taxon_id, e);
                    ok = false;
                }
            }

            match self.taxonomy.classification(taxon_id) {
                Ok(lineage) if !lineage.is_empty() => {
                    lineages.insert(taxon_id, lineage);
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Taxon {} classification failed: {}", taxon_id, e);
                    ok = false;
                }
            }

            match self.taxonomy.attributes(taxon_id) {
                Ok(attributes) => {
                    let profile = interpret_attributes(&attributes);
                    sp.functional_group = sp.functional_group.take().or(profile.functional_group);
                    sp.trophic_level = sp.trophic_level.or(profile.trophic_level);
                    if sp.conservation_status.is_none() {
                        sp.conservation_status = profile.conservation_status;
                    }
                }
                Err(e) => {
                    debug!("Taxon {} attributes failed: {}", taxon_id, e);
                    ok = false;
                }
            }

            if ok {
                enriched += 1;
            } else {
                failures += 1;
            }
        }

        if enriched > 0 {
            record.add_data_source(data_sources::TAXONOMY);
        }

        let detail = format!(
            "{} species, {} enriched, {} enrichment failures",
            species.len(),
            enriched,
            failures
        );
        let outcome = if failures > 0 {
            warn!("Species enrichment for '{}' partial: {}", record.canonical_name, detail);
            StepOutcome::Degraded
        } else {
            StepOutcome::Completed
        };
        record.species = species;
        record.record_step(PipelineStep::PopulateSpecies, outcome, detail);

        lineages
    }

    fn characterize_habitat(
        &self,
        record: &mut SiteCharacterization,
        lineages: &FxHashMap<u64, TaxonomicLineage>,
    ) {
        record.habitats = infer_habitats(&record.species, Some(lineages));

        let detail = match record.primary_habitat() {
            Some(primary) => format!(
                "{} candidates, primary {} ({:.2})",
                record.habitats.len(),
                primary.habitat,
                primary.confidence
            ),
            None => "no habitat evidence".to_string(),
        };
        record.record_step(PipelineStep::CharacterizeHabitat, StepOutcome::Completed, detail);
    }

    fn estimate_services(&self, record: &mut SiteCharacterization) {
        let estimate = self.estimator.estimate(&record.habitats, record.area_km2());

        if estimate.is_empty() {
            record.record_step(
                PipelineStep::EstimateServices,
                StepOutcome::Completed,
                "no applicable axioms or area",
            );
            return;
        }

        record.add_data_source(data_sources::AXIOM_REGISTRY);
        record.estimated_esv_usd = Some(estimate.total_usd);
        record.esv_confidence = Some(estimate.confidence());
        let detail = format!(
            "{} services, total {:.0} USD/yr [{:.0}, {:.0}]",
            estimate.services.len(),
            estimate.total_usd,
            estimate.ci_low,
            estimate.ci_high
        );
        record.ecosystem_services = estimate.services;
        record.record_step(PipelineStep::EstimateServices, StepOutcome::Completed, detail);
    }

    fn score_and_rate(&self, record: &mut SiteCharacterization) -> Result<(), ValidationError> {
        let criteria = neoli_from_metadata(
            record.designation_year,
            record.area_km2(),
            self.reference_year,
        );
        let assessment = NeoliAssessment::from_criteria(criteria);
        record.set_neoli(assessment)?;

        let rating = asset_rating(assessment.score, record.estimated_esv_usd);
        record.asset_rating = Some(rating.to_string());
        record.record_step(
            PipelineStep::ScoreAndRate,
            StepOutcome::Completed,
            format!("NEOLI {}/5, rating {}", assessment.score, rating),
        );
        Ok(())
    }
}

fn apply_hints(
    record: &mut SiteCharacterization,
    hints: &SiteHints,
) -> Result<(), ValidationError> {
    let mut used = false;
    if let Some(country) = hints.country.as_ref().filter(|c| !c.trim().is_empty()) {
        record.country = Some(country.trim().to_string());
        used = true;
    }
    if let Some((lat, lon)) = hints.coordinates {
        record.set_coordinates(lat, lon)?;
        used = true;
    }
    if let Some(area) = hints.area_km2 {
        record.set_area_km2(area)?;
        used = true;
    }
    if let Some(year) = hints.designation_year {
        record.designation_year = Some(year);
        used = true;
    }
    if used {
        record.add_data_source(data_sources::CALLER);
    }
    Ok(())
}

/// One record per taxon id, or per lowercased name when the id is missing.
/// First occurrence wins.
fn dedupe_occurrences(rows: Vec<OccurrenceRecord>) -> Vec<SpeciesRecord> {
    let mut seen_ids = FxHashSet::default();
    let mut seen_names = FxHashSet::default();
    let mut species = Vec::new();

    for row in rows {
        let fresh = match row.taxon_id {
            Some(id) => seen_ids.insert(id),
            None => seen_names.insert(row.scientific_name.to_lowercase()),
        };
        if fresh {
            species.push(SpeciesRecord {
                scientific_name: row.scientific_name,
                common_name: row.vernacular_name,
                taxon_id: row.taxon_id,
                ..Default::default()
            });
        }
    }

    species
}
