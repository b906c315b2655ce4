//! Bridge-Axiom Registry
//!
//! Loads a JSON catalog of bridge axioms and builds an immutable
//! habitat → per-hectare value index from it.
//!
//! **Coefficient extraction** (first rule that matches wins, keys checked in
//! sorted order):
//! 1. key encodes USD per hectare (`usd` + `per_ha`/`per_hectare`) → direct value
//! 2. key encodes a sequestration rate in tCO2/ha/yr → value × carbon price
//! 3. anything else → axiom skipped
//!
//! The index stores coefficients, not dollars. Carbon price and the default
//! CI band are applied at lookup time ([`AxiomEntry::per_hectare_usd`]), so
//! one index serves every pricing policy.

use crate::config::EsvSettings;
use crate::models::{service_types, valuation_methods, HabitatType};
use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Catalog shipped with the crate
pub const BUNDLED_CATALOG: &str = include_str!("../../data/bridge_axioms.json");

// ============================================================================
// CATALOG DOCUMENT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxiomCatalog {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub axioms: Vec<BridgeAxiom>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeAxiom {
    #[serde(alias = "id")]
    pub axiom_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub valuation_method: Option<String>,
    #[serde(default, alias = "habitats")]
    pub applicable_habitats: Vec<String>,
    /// Raw coefficient values: numbers or `{value, ci_low, ci_high}` objects
    #[serde(default)]
    pub coefficients: BTreeMap<String, Value>,
    #[serde(default)]
    pub source: Option<AxiomSource>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AxiomSource {
    #[serde(default)]
    pub citation: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
}

/// Either `{"axioms": [...]}` or a bare list
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Bare(Vec<BridgeAxiom>),
    Wrapped(AxiomCatalog),
}

impl AxiomCatalog {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let doc: CatalogDocument =
            serde_json::from_str(json).context("Failed to parse axiom catalog JSON")?;
        Ok(match doc {
            CatalogDocument::Wrapped(catalog) => catalog,
            CatalogDocument::Bare(axioms) => Self {
                version: None,
                description: None,
                axioms,
            },
        })
    }
}

// ============================================================================
// COEFFICIENTS
// ============================================================================

/// A numeric coefficient, with or without an explicit interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Coefficient {
    Scalar(f64),
    Interval { value: f64, low: f64, high: f64 },
}

impl Coefficient {
    /// Parse one raw coefficient value.
    ///
    /// Accepts a number, a numeric string, or an object with a numeric
    /// `value` and optional `ci_low`/`ci_high` (aliases `low`/`high`).
    /// An object missing either bound is treated as a scalar.
    pub fn parse(raw: &Value) -> Option<Self> {
        match raw {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).map(Coefficient::Scalar),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Coefficient::Scalar),
            Value::Object(map) => {
                let number = |keys: &[&str]| {
                    keys.iter()
                        .find_map(|k| map.get(*k).and_then(Value::as_f64))
                        .filter(|v| v.is_finite())
                };
                let value = number(&["value", "mean", "point"])?;
                match (number(&["ci_low", "low"]), number(&["ci_high", "high"])) {
                    (Some(a), Some(b)) => Some(Coefficient::Interval {
                        value,
                        low: a.min(b),
                        high: a.max(b),
                    }),
                    _ => Some(Coefficient::Scalar(value)),
                }
            }
            _ => None,
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            Coefficient::Scalar(v) => v,
            Coefficient::Interval { value, .. } => value,
        }
    }

    /// (value, low, high), applying `default_band` to scalars
    pub fn bounds(&self, default_band: f64) -> ValueInterval {
        match *self {
            Coefficient::Scalar(v) => {
                let a = v * (1.0 - default_band);
                let b = v * (1.0 + default_band);
                ValueInterval {
                    value: v,
                    low: a.min(b),
                    high: a.max(b),
                }
            }
            Coefficient::Interval { value, low, high } => ValueInterval { value, low, high },
        }
    }
}

/// Point value with a confidence interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueInterval {
    pub value: f64,
    pub low: f64,
    pub high: f64,
}

impl ValueInterval {
    pub fn scaled(&self, factor: f64) -> Self {
        let a = self.low * factor;
        let b = self.high * factor;
        Self {
            value: self.value * factor,
            low: a.min(b),
            high: a.max(b),
        }
    }
}

/// How an indexed coefficient turns into dollars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueBasis {
    /// Already USD per hectare per year
    UsdPerHectare,
    /// tCO2 per hectare per year, priced at the configured carbon price
    CarbonPerHectare,
}

/// Whole-token match: `usd_per_ha_yr`, `usd/ha`, `value_per_hectare`.
/// `per_haul` or `per_habitat_patch` do not count.
fn is_per_hectare(key: &str) -> bool {
    let tokens: Vec<&str> = key
        .split(|c| matches!(c, '_' | '/' | '-'))
        .filter(|t| !t.is_empty())
        .collect();

    tokens.contains(&"ha")
        || tokens
            .windows(2)
            .any(|w| w[0] == "per" && matches!(w[1], "hectare" | "hectares"))
}

/// Classify a coefficient key, or `None` when it is not translatable
pub fn classify_coefficient_key(key: &str) -> Option<ValueBasis> {
    let k = key.to_lowercase();
    if !is_per_hectare(&k) {
        return None;
    }
    if k.contains("usd") || k.contains("dollar") {
        return Some(ValueBasis::UsdPerHectare);
    }
    let is_rate = k.contains("yr") || k.contains("year") || k.contains("annual");
    if k.contains("co2") && is_rate {
        return Some(ValueBasis::CarbonPerHectare);
    }
    None
}

/// Pick the coefficient an axiom is valued by: direct USD first, then carbon.
fn select_coefficient(
    coefficients: &BTreeMap<String, Value>,
) -> Option<(String, ValueBasis, Coefficient)> {
    for wanted in [ValueBasis::UsdPerHectare, ValueBasis::CarbonPerHectare] {
        for (key, raw) in coefficients {
            if classify_coefficient_key(key) != Some(wanted) {
                continue;
            }
            if let Some(coefficient) = Coefficient::parse(raw) {
                return Some((key.clone(), wanted, coefficient));
            }
        }
    }
    None
}

// ============================================================================
// INDEX
// ============================================================================

/// One translatable axiom as applied to one habitat
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxiomEntry {
    pub axiom_id: String,
    pub name: String,
    pub service_type: String,
    pub valuation_method: String,
    pub coefficient_key: String,
    pub basis: ValueBasis,
    pub coefficient: Coefficient,
    pub citation: Option<String>,
}

impl AxiomEntry {
    pub fn is_carbon_derived(&self) -> bool {
        self.basis == ValueBasis::CarbonPerHectare
    }

    /// USD per hectare per year under the given policy
    pub fn per_hectare_usd(&self, settings: &EsvSettings) -> ValueInterval {
        let bounds = self.coefficient.bounds(settings.default_ci_band);
        match self.basis {
            ValueBasis::UsdPerHectare => bounds,
            ValueBasis::CarbonPerHectare => bounds.scaled(settings.carbon_price_usd_per_tonne),
        }
    }
}

/// Counts reported after a build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub axioms_total: usize,
    pub axioms_indexed: usize,
    /// No translatable per-hectare coefficient
    pub axioms_skipped: usize,
    pub carbon_derived: usize,
    /// (habitat, axiom) pairs
    pub entries: usize,
}

/// Immutable habitat → applicable axiom entries
#[derive(Debug, Clone, Default)]
pub struct AxiomIndex {
    by_habitat: FxHashMap<HabitatType, Vec<AxiomEntry>>,
    stats: IndexStats,
}

impl AxiomIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(catalog: &AxiomCatalog) -> Self {
        let mut by_habitat: FxHashMap<HabitatType, Vec<AxiomEntry>> = FxHashMap::default();
        let mut stats = IndexStats {
            axioms_total: catalog.axioms.len(),
            ..Default::default()
        };

        for axiom in &catalog.axioms {
            let Some((key, basis, coefficient)) = select_coefficient(&axiom.coefficients) else {
                debug!("Skipping axiom {}: no per-hectare coefficient", axiom.axiom_id);
                stats.axioms_skipped += 1;
                continue;
            };

            let habitats: Vec<HabitatType> = axiom
                .applicable_habitats
                .iter()
                .filter_map(|id| {
                    let habitat = HabitatType::from_id(id);
                    if habitat.is_none() {
                        debug!("Axiom {}: unknown habitat {:?}", axiom.axiom_id, id);
                    }
                    habitat
                })
                .collect();
            if habitats.is_empty() {
                stats.axioms_skipped += 1;
                continue;
            }

            let carbon = basis == ValueBasis::CarbonPerHectare;
            let entry = AxiomEntry {
                axiom_id: axiom.axiom_id.clone(),
                name: axiom.name.clone(),
                service_type: axiom.service_type.clone().unwrap_or_else(|| {
                    if carbon {
                        service_types::CARBON_SEQUESTRATION.to_string()
                    } else {
                        axiom.category.clone().unwrap_or_else(|| "unspecified".to_string())
                    }
                }),
                valuation_method: axiom.valuation_method.clone().unwrap_or_else(|| {
                    if carbon {
                        valuation_methods::CARBON_MARKET_PRICE
                    } else {
                        valuation_methods::BENEFIT_TRANSFER
                    }
                    .to_string()
                }),
                coefficient_key: key,
                basis,
                coefficient,
                citation: axiom.source.as_ref().and_then(|s| s.citation.clone()),
            };

            stats.axioms_indexed += 1;
            if carbon {
                stats.carbon_derived += 1;
            }
            for habitat in habitats {
                let list = by_habitat.entry(habitat).or_default();
                if !list.iter().any(|e| e.axiom_id == entry.axiom_id) {
                    list.push(entry.clone());
                    stats.entries += 1;
                }
            }
        }

        Self { by_habitat, stats }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self::build(&AxiomCatalog::from_json_str(json)?))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read axiom catalog: {:?}", path))?;
        Self::from_json_str(&contents).with_context(|| format!("Invalid axiom catalog: {:?}", path))
    }

    pub fn bundled() -> Result<Self> {
        Self::from_json_str(BUNDLED_CATALOG)
    }

    /// Load the catalog, degrading to an empty index on any failure.
    ///
    /// `None` uses the bundled catalog.
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let loaded = match path {
            Some(path) => Self::load(path),
            None => Self::bundled(),
        };
        match loaded {
            Ok(index) => {
                let s = index.stats();
                info!(
                    "Axiom index built: {} axioms, {} indexed ({} carbon-derived), \
                     {} skipped, {} habitat entries",
                    s.axioms_total, s.axioms_indexed, s.carbon_derived, s.axioms_skipped, s.entries
                );
                index
            }
            Err(e) => {
                warn!("Axiom registry unavailable, ESV estimation disabled: {:#}", e);
                Self::empty()
            }
        }
    }

    /// Process-wide index, built on first access.
    ///
    /// Only the first caller's `path` is used.
    pub fn global(path: Option<&Path>) -> &'static AxiomIndex {
        static INSTANCE: OnceLock<AxiomIndex> = OnceLock::new();
        INSTANCE.get_or_init(|| Self::load_or_empty(path))
    }

    pub fn entries_for(&self, habitat: HabitatType) -> &[AxiomEntry] {
        self.by_habitat.get(&habitat).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Habitats with at least one entry, in vocabulary order
    pub fn habitats(&self) -> Vec<HabitatType> {
        HabitatType::ALL
            .into_iter()
            .filter(|h| self.by_habitat.contains_key(h))
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    pub fn is_empty(&self) -> bool {
        self.by_habitat.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn test_parse_coefficient_shapes() {
        assert_eq!(Coefficient::parse(&json!(1200)), Some(Coefficient::Scalar(1200.0)));
        assert_eq!(Coefficient::parse(&json!("3.5")), Some(Coefficient::Scalar(3.5)));
        assert_eq!(
            Coefficient::parse(&json!({"value": 10.0, "ci_low": 12.0, "ci_high": 4.0})),
            Some(Coefficient::Interval { value: 10.0, low: 4.0, high: 12.0 })
        );
        assert_eq!(
            Coefficient::parse(&json!({"value": 10.0, "ci_low": 8.0})),
            Some(Coefficient::Scalar(10.0))
        );
        assert_eq!(Coefficient::parse(&json!({"ci_low": 8.0})), None);
        assert_eq!(Coefficient::parse(&json!("n/a")), None);
        assert_eq!(Coefficient::parse(&json!([1, 2])), None);
    }

    #[test]
    fn test_scalar_default_band() {
        let b = Coefficient::Scalar(1000.0).bounds(0.30);
        assert_relative_eq!(b.low, 700.0, max_relative = 1e-12);
        assert_relative_eq!(b.high, 1300.0, max_relative = 1e-12);

        let neg = Coefficient::Scalar(-100.0).bounds(0.30);
        assert!(neg.low < neg.high);
    }

    #[test]
    fn test_classify_keys() {
        assert_eq!(classify_coefficient_key("usd_per_ha_yr"), Some(ValueBasis::UsdPerHectare));
        assert_eq!(
            classify_coefficient_key("value_USD_per_hectare"),
            Some(ValueBasis::UsdPerHectare)
        );
        assert_eq!(
            classify_coefficient_key("sequestration_tco2_per_ha_yr"),
            Some(ValueBasis::CarbonPerHectare)
        );
        assert_eq!(classify_coefficient_key("carbon_stock_tc_per_ha"), None);
        assert_eq!(classify_coefficient_key("biomass_ratio_reserve_to_fished"), None);
        assert_eq!(classify_coefficient_key("usd_total"), None);
        assert_eq!(classify_coefficient_key("usd/ha/yr"), Some(ValueBasis::UsdPerHectare));
        assert_eq!(classify_coefficient_key("usd-per-hectares"), Some(ValueBasis::UsdPerHectare));
    }

    #[test]
    fn test_hectare_must_be_whole_token() {
        for key in [
            "catch_usd_per_haul",
            "usd_per_habitat_patch",
            "usd_per_harbour_visit",
            "co2_per_harvest_yr",
            "usd_per_hectareage",
            "usd_hectare_yr",
        ] {
            assert_eq!(classify_coefficient_key(key), None, "{}", key);
        }

        let index = AxiomIndex::from_json_str(
            r#"[{"axiom_id": "H1", "applicable_habitats": ["coral_reef"],
                 "coefficients": {"catch_usd_per_haul": 500}}]"#,
        )
        .unwrap();
        assert!(index.entries_for(HabitatType::CoralReef).is_empty());
        assert_eq!(index.stats().axioms_skipped, 1);
    }

    #[test]
    fn test_direct_value_preferred_over_carbon() {
        let catalog = AxiomCatalog::from_json_str(
            r#"[{"axiom_id": "X1", "applicable_habitats": ["mangrove_forest"],
                 "coefficients": {"sequestration_tco2_per_ha_yr": 6.0, "usd_per_ha_yr": 500}}]"#,
        )
        .unwrap();
        let index = AxiomIndex::build(&catalog);
        let entry = &index.entries_for(HabitatType::MangroveForest)[0];
        assert_eq!(entry.basis, ValueBasis::UsdPerHectare);
        assert_eq!(entry.valuation_method, valuation_methods::BENEFIT_TRANSFER);
    }

    #[test]
    fn test_carbon_entry_priced_at_lookup() {
        let index = AxiomIndex::from_json_str(
            r#"{"axioms": [{"axiom_id": "C1", "applicable_habitats": ["seagrass"],
                 "coefficients": {"sequestration_tco2_per_ha_yr": {"value": 5.0, "ci_low": 2.0, "ci_high": 8.0}}}]}"#,
        )
        .unwrap();
        let entry = &index.entries_for(HabitatType::SeagrassMeadow)[0];
        assert!(entry.is_carbon_derived());
        assert_eq!(entry.service_type, service_types::CARBON_SEQUESTRATION);

        let settings = EsvSettings {
            carbon_price_usd_per_tonne: 50.0,
            default_ci_band: 0.30,
        };
        let v = entry.per_hectare_usd(&settings);
        assert_relative_eq!(v.value, 250.0);
        assert_relative_eq!(v.low, 100.0);
        assert_relative_eq!(v.high, 400.0);
    }

    #[test]
    fn test_untranslatable_and_unknown_habitats_skipped() {
        let index = AxiomIndex::from_json_str(
            r#"[{"axiom_id": "S1", "applicable_habitats": ["coral_reef"], "coefficients": {"elasticity": 0.4}},
                {"axiom_id": "S2", "applicable_habitats": ["tundra"], "coefficients": {"usd_per_ha_yr": 10}},
                {"axiom_id": "S3", "applicable_habitats": ["coral_reef", "tundra"], "coefficients": {"usd_per_ha_yr": 10}}]"#,
        )
        .unwrap();
        let stats = index.stats();
        assert_eq!(stats.axioms_total, 3);
        assert_eq!(stats.axioms_indexed, 1);
        assert_eq!(stats.axioms_skipped, 2);
        assert_eq!(stats.entries, 1);
        assert_eq!(index.habitats(), vec![HabitatType::CoralReef]);
    }

    #[test]
    fn test_bundled_catalog() {
        let catalog = AxiomCatalog::from_json_str(BUNDLED_CATALOG).unwrap();
        assert!(catalog.axioms.len() >= 35);

        let index = AxiomIndex::bundled().unwrap();
        let stats = index.stats();
        assert_eq!(stats.axioms_total, catalog.axioms.len());
        assert!(stats.axioms_skipped > 0);
        assert!(stats.carbon_derived > 0);
        assert_eq!(stats.axioms_indexed + stats.axioms_skipped, stats.axioms_total);

        // Every habitat in the vocabulary has at least one valuation
        assert_eq!(index.habitats().len(), HabitatType::ALL.len());
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let index = AxiomIndex::load_or_empty(Some(Path::new("/nonexistent/axioms.json")));
        assert!(index.is_empty());
        assert!(index.entries_for(HabitatType::CoralReef).is_empty());
    }
}
