//! ESV Estimator
//!
//! Applies the axiom index to a habitat list:
//! - hectares = extent (or site area when extent is unknown) × 100
//! - one [`EcosystemServiceEstimate`] per (habitat, applicable axiom)
//! - total and CI bounds are plain sums across estimates
//!
//! Habitats with no axioms or no usable area contribute nothing.

use super::axioms::AxiomIndex;
use crate::config::EsvSettings;
use crate::models::{
    valuation_methods, EcosystemServiceEstimate, EsvConfidence, HabitatInfo, HabitatType,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const HECTARES_PER_KM2: f64 = 100.0;

pub fn km2_to_hectares(km2: f64) -> f64 {
    km2 * HECTARES_PER_KM2
}

/// Result of one estimation pass
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EsvEstimate {
    pub services: Vec<EcosystemServiceEstimate>,
    pub total_usd: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    /// Sorted, de-duplicated
    pub axioms_used: Vec<String>,
}

impl EsvEstimate {
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn confidence(&self) -> EsvConfidence {
        EsvConfidence {
            ci_low: self.ci_low,
            ci_high: self.ci_high,
            method: valuation_methods::BRIDGE_AXIOM_TOTAL.to_string(),
            axioms_used: self.axioms_used.clone(),
            n_services: self.services.len(),
        }
    }
}

pub struct EsvEstimator<'a> {
    index: &'a AxiomIndex,
    settings: EsvSettings,
}

impl<'a> EsvEstimator<'a> {
    pub fn new(index: &'a AxiomIndex, settings: EsvSettings) -> Self {
        Self { index, settings }
    }

    pub fn settings(&self) -> &EsvSettings {
        &self.settings
    }

    /// Estimates for one habitat over `hectares`
    pub fn estimate_habitat(
        &self,
        habitat: HabitatType,
        hectares: f64,
    ) -> Vec<EcosystemServiceEstimate> {
        if !(hectares > 0.0) {
            return Vec::new();
        }

        self.index
            .entries_for(habitat)
            .iter()
            .map(|entry| {
                let per_ha = entry.per_hectare_usd(&self.settings).scaled(hectares);
                EcosystemServiceEstimate {
                    service_type: entry.service_type.clone(),
                    annual_value_usd: per_ha.value,
                    valuation_method: entry.valuation_method.clone(),
                    axioms_used: vec![entry.axiom_id.clone()],
                    ci_low: per_ha.low,
                    ci_high: per_ha.high,
                    habitat: Some(habitat),
                    hectares: Some(hectares),
                }
            })
            .collect()
    }

    /// Estimate every habitat. `site_area_km2` stands in for missing extents.
    pub fn estimate(&self, habitats: &[HabitatInfo], site_area_km2: Option<f64>) -> EsvEstimate {
        let mut result = EsvEstimate::default();

        for info in habitats {
            let Some(km2) = info.extent_km2.or(site_area_km2) else {
                debug!("No extent or site area for {}, skipping", info.habitat);
                continue;
            };
            let services = self.estimate_habitat(info.habitat, km2_to_hectares(km2));
            if services.is_empty() {
                debug!("No axiom contributions for {} ({} km²)", info.habitat, km2);
            }
            result.services.extend(services);
        }

        for service in &result.services {
            result.total_usd += service.annual_value_usd;
            result.ci_low += service.ci_low;
            result.ci_high += service.ci_high;
            result.axioms_used.extend(service.axioms_used.iter().cloned());
        }
        result.axioms_used.sort();
        result.axioms_used.dedup();

        result
    }
}
