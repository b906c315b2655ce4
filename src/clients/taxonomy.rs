//! Taxonomy Client (WoRMS REST)
//!
//! Endpoints used:
//! - `GET /AphiaRecordByAphiaID/{id}`
//! - `GET /AphiaClassificationByAphiaID/{id}` (nested parent → child tree)
//! - `GET /AphiaAttributesByAphiaID/{id}` (measurementType / measurementValue pairs)
//! - `GET /AphiaVernacularsByAphiaID/{id}`

use super::retry::{as_list, as_map, ResilientHttp};
use super::{field_str, field_u64, join_url, TaxonomySource};
use crate::error::ClientError;
use crate::models::TaxonomicLineage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonRecord {
    pub taxon_id: u64,
    pub scientific_name: String,
    pub rank: Option<String>,
    pub conservation_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonAttribute {
    pub measurement_type: String,
    pub measurement_value: String,
}

/// Species traits interpreted from registry attributes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeProfile {
    pub functional_group: Option<String>,
    pub trophic_level: Option<f64>,
    pub conservation_status: Option<String>,
}

/// Pull functional group, trophic level and IUCN category out of attribute pairs.
///
/// First match wins for each trait.
pub fn interpret_attributes(attributes: &[TaxonAttribute]) -> AttributeProfile {
    let mut profile = AttributeProfile::default();

    for attr in attributes {
        let kind = attr.measurement_type.to_lowercase();
        let value = attr.measurement_value.trim();
        if value.is_empty() {
            continue;
        }

        if kind.contains("functional group") && profile.functional_group.is_none() {
            profile.functional_group = Some(value.to_lowercase());
        } else if kind.contains("trophic level") && profile.trophic_level.is_none() {
            profile.trophic_level = value.parse().ok().filter(|t: &f64| t.is_finite());
        } else if kind.contains("iucn") && profile.conservation_status.is_none() {
            profile.conservation_status = Some(value.to_string());
        }
    }

    profile
}

pub struct TaxonomyClient {
    http: ResilientHttp,
    base_url: String,
}

impl TaxonomyClient {
    pub fn new(http: ResilientHttp, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// English vernacular name, falling back to the first listed
    pub fn vernacular_name(&self, taxon_id: u64) -> Result<Option<String>, ClientError> {
        let url = join_url(&self.base_url, &format!("AphiaVernacularsByAphiaID/{}", taxon_id));
        let rows = as_list(self.http.get_json(&url, &[])?);

        let names: Vec<(Option<String>, String)> = rows
            .iter()
            .filter_map(|row| {
                let map = row.as_object()?;
                Some((field_str(map, &["language_code"]), field_str(map, &["vernacular"])?))
            })
            .collect();

        let english = names.iter().find(|(lang, _)| lang.as_deref() == Some("eng"));
        Ok(english.or(names.first()).map(|(_, name)| name.clone()))
    }
}

impl TaxonomySource for TaxonomyClient {
    fn lookup(&self, taxon_id: u64) -> Result<Option<TaxonRecord>, ClientError> {
        let url = join_url(&self.base_url, &format!("AphiaRecordByAphiaID/{}", taxon_id));
        let map = as_map(self.http.get_json(&url, &[])?);

        let names = ["scientificname", "scientific_name", "valid_name"];
        let Some(scientific_name) = field_str(&map, &names) else {
            return Ok(None);
        };

        Ok(Some(TaxonRecord {
            taxon_id: field_u64(&map, &["AphiaID", "valid_AphiaID"]).unwrap_or(taxon_id),
            scientific_name,
            rank: field_str(&map, &["rank"]),
            conservation_status: field_str(&map, &["conservation_status", "iucn_status"]),
        }))
    }

    fn classification(&self, taxon_id: u64) -> Result<TaxonomicLineage, ClientError> {
        let url = join_url(&self.base_url, &format!("AphiaClassificationByAphiaID/{}", taxon_id));
        Ok(flatten_classification(&self.http.get_json(&url, &[])?))
    }

    fn attributes(&self, taxon_id: u64) -> Result<Vec<TaxonAttribute>, ClientError> {
        let url = join_url(&self.base_url, &format!("AphiaAttributesByAphiaID/{}", taxon_id));
        let mut out = Vec::new();
        for row in as_list(self.http.get_json(&url, &[])?) {
            collect_attributes(&row, &mut out);
        }
        Ok(out)
    }
}

/// Walk the `child` chain of a classification tree, keeping the ranks we use.
pub(crate) fn flatten_classification(tree: &Value) -> TaxonomicLineage {
    let mut lineage = TaxonomicLineage::default();
    let mut node = tree;

    // Depth bound guards against malformed cyclic-looking payloads
    for _ in 0..64 {
        let Some(map) = node.as_object() else { break };

        let rank = field_str(map, &["rank"]);
        if let (Some(rank), Some(name)) = (rank, field_str(map, &["scientificname"])) {
            let slot = match rank.to_lowercase().as_str() {
                "kingdom" => Some(&mut lineage.kingdom),
                "phylum" | "phylum (division)" => Some(&mut lineage.phylum),
                "class" => Some(&mut lineage.class),
                "order" => Some(&mut lineage.order),
                "family" => Some(&mut lineage.family),
                "genus" => Some(&mut lineage.genus),
                _ => None,
            };
            if let Some(slot) = slot {
                *slot = Some(name);
            }
        }

        match map.get("child") {
            Some(child) if child.is_object() => node = child,
            _ => break,
        }
    }

    lineage
}

fn collect_attributes(row: &Value, out: &mut Vec<TaxonAttribute>) {
    let Some(map) = row.as_object() else { return };

    if let (Some(measurement_type), Some(measurement_value)) = (
        field_str(map, &["measurementType", "measurement_type"]),
        field_str(map, &["measurementValue", "measurement_value"]),
    ) {
        out.push(TaxonAttribute {
            measurement_type,
            measurement_value,
        });
    }

    if let Some(Value::Array(children)) = map.get("children") {
        for child in children {
            collect_attributes(child, out);
        }
    }
}
