//! Site Registry
//!
//! In-memory store of characterizations keyed by normalized site name, with
//! JSON persistence. Every write is validated against the record's tier:
//! - all tiers: model invariants (area, coordinates, NEOLI range, habitats)
//! - Silver+: NEOLI assessed and a rating assigned
//! - Gold: at least one species and a total ESV

use crate::error::RegistryError;
use crate::models::{CharacterizationTier, SiteCharacterization};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Lower-case and collapse whitespace: `"  Cabo   Pulmo "` → `"cabo pulmo"`
pub fn normalize_site_key(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn requirement(record: &SiteCharacterization, reason: &str) -> RegistryError {
    RegistryError::TierRequirement {
        site: record.canonical_name.clone(),
        tier: record.tier.to_string(),
        reason: reason.to_string(),
    }
}

/// Check a record meets the requirements of its own tier
pub fn validate_for_tier(record: &SiteCharacterization) -> Result<(), RegistryError> {
    record.validate()?;

    if record.tier >= CharacterizationTier::Silver {
        if record.neoli().is_none() {
            return Err(requirement(record, "NEOLI assessment missing"));
        }
        if record.asset_rating.is_none() {
            return Err(requirement(record, "asset rating missing"));
        }
    }

    if record.tier == CharacterizationTier::Gold {
        if record.species.is_empty() {
            return Err(requirement(record, "no species recorded"));
        }
        if record.estimated_esv_usd.is_none() {
            return Err(requirement(record, "no ESV estimate"));
        }
    }

    Ok(())
}

#[derive(Debug, Default)]
pub struct SiteRegistry {
    sites: BTreeMap<String, SiteCharacterization>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record. Returns the record it replaced.
    pub fn upsert(
        &mut self,
        record: SiteCharacterization,
    ) -> Result<Option<SiteCharacterization>, RegistryError> {
        validate_for_tier(&record)?;
        let key = normalize_site_key(&record.canonical_name);
        debug!("Registry upsert '{}' ({})", key, record.tier);
        Ok(self.sites.insert(key, record))
    }

    pub fn get(&self, name: &str) -> Option<&SiteCharacterization> {
        self.sites.get(&normalize_site_key(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<SiteCharacterization> {
        self.sites.remove(&normalize_site_key(name))
    }

    /// All records, ordered by key
    pub fn list(&self) -> Vec<&SiteCharacterization> {
        self.sites.values().collect()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Write all records as a JSON array
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let json = serde_json::to_string_pretty(&self.list())?;
        fs::write(path, json)?;
        info!("Saved {} sites to {:?}", self.len(), path);
        Ok(())
    }

    /// Read a registry written by [`SiteRegistry::save`], re-validating every record
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let contents = fs::read_to_string(path)?;
        let records: Vec<SiteCharacterization> = serde_json::from_str(&contents)?;

        let mut registry = Self::new();
        for record in records {
            registry.upsert(record)?;
        }
        info!("Loaded {} sites from {:?}", registry.len(), path);
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::models::{NeoliAssessment, NeoliCriteria, SpeciesRecord};

    fn silver(name: &str) -> SiteCharacterization {
        let mut record = SiteCharacterization::new(name).unwrap();
        record.tier = CharacterizationTier::Silver;
        record
            .set_neoli(NeoliAssessment::from_criteria(NeoliCriteria::default()))
            .unwrap();
        record.asset_rating = Some("BB".into());
        record
    }

    #[test]
    fn test_normalize_site_key() {
        assert_eq!(
            normalize_site_key("  Cabo   Pulmo\tNational Park "),
            "cabo pulmo national park"
        );
        assert_eq!(normalize_site_key("GREAT BARRIER REEF"), "great barrier reef");
        assert_eq!(normalize_site_key(""), "");
    }

    #[test]
    fn test_bronze_needs_only_valid_model() {
        let record = SiteCharacterization::new("Tubbataha").unwrap();
        assert!(validate_for_tier(&record).is_ok());
    }

    #[test]
    fn test_silver_requires_rating() {
        let mut record = silver("Tubbataha");
        assert!(validate_for_tier(&record).is_ok());

        record.asset_rating = None;
        assert!(matches!(
            validate_for_tier(&record),
            Err(RegistryError::TierRequirement { .. })
        ));
    }

    #[test]
    fn test_gold_requires_species_and_esv() {
        let mut record = silver("Tubbataha");
        record.tier = CharacterizationTier::Gold;

        let err = validate_for_tier(&record).unwrap_err();
        assert!(err.to_string().contains("no species"));

        record.species.push(SpeciesRecord::new("Acropora palmata"));
        let err = validate_for_tier(&record).unwrap_err();
        assert!(err.to_string().contains("no ESV"));

        record.estimated_esv_usd = Some(1.0e6);
        assert!(validate_for_tier(&record).is_ok());
    }

    #[test]
    fn test_invalid_model_rejected() {
        let mut record = SiteCharacterization::new("Bad").unwrap();
        record.canonical_name = "   ".into();
        assert!(matches!(
            validate_for_tier(&record),
            Err(RegistryError::Invalid(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn test_upsert_get_list() {
        let mut registry = SiteRegistry::new();
        let bronze = SiteCharacterization::new("Cabo Pulmo").unwrap();
        assert!(registry.upsert(bronze).unwrap().is_none());
        assert!(registry.upsert(silver("Apo Island")).unwrap().is_none());

        // Same key, different spelling, replaces
        let previous = registry.upsert(silver("  cabo  PULMO ")).unwrap().unwrap();
        assert_eq!(previous.tier, CharacterizationTier::Bronze);

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("CABO PULMO").unwrap().tier, CharacterizationTier::Silver);
        let names: Vec<&str> = registry.list().iter().map(|r| r.canonical_name.as_str()).collect();
        assert_eq!(names, vec!["Apo Island", "  cabo  PULMO "]);

        assert!(registry.remove("apo island").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.json");

        let mut registry = SiteRegistry::new();
        let mut record = silver("Cabo Pulmo");
        record.set_area_km2(71.5).unwrap();
        record.set_coordinates(23.5, -109.25).unwrap();
        registry.upsert(record.clone()).unwrap();
        registry.save(&path).unwrap();

        let loaded = SiteRegistry::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("cabo pulmo"), Some(&record));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SiteRegistry::load(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, RegistryError::Io(_)));
    }
}
