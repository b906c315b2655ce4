//! Data-Source Clients
//!
//! Three upstream registries, each behind a trait so the characterizer can be
//! driven by the real HTTP clients or by test doubles:
//! - [`OccurrenceSource`]: species occurrences (OBIS)
//! - [`TaxonomySource`]: taxon records, classification, attributes (WoRMS)
//! - [`GazetteerSource`]: place names and boundaries (Marine Regions)
//!
//! All HTTP goes through [`retry::ResilientHttp`].

pub mod gazetteer;
pub mod occurrence;
pub mod retry;
pub mod taxonomy;

pub use gazetteer::{best_match, GazetteerClient, GazetteerRecord};
pub use occurrence::{OccurrenceClient, OccurrenceRecord};
pub use retry::{HttpResponse, HttpTransport, ReqwestTransport, ResilientHttp, RetryPolicy};
pub use taxonomy::{
    interpret_attributes, AttributeProfile, TaxonAttribute, TaxonRecord, TaxonomyClient,
};

use crate::error::ClientError;
use crate::models::TaxonomicLineage;
use serde_json::{Map, Value};

/// Spatial filter for occurrence queries
#[derive(Debug, Clone, PartialEq)]
pub enum AreaFilter {
    /// WKT polygon
    Geometry(String),
    /// Free-text area name
    AreaName(String),
}

pub trait OccurrenceSource: Send + Sync {
    /// Occurrence records inside the area, in upstream order
    fn search_occurrences(
        &self,
        filter: &AreaFilter,
        limit: usize,
    ) -> Result<Vec<OccurrenceRecord>, ClientError>;
}

pub trait TaxonomySource: Send + Sync {
    fn lookup(&self, taxon_id: u64) -> Result<Option<TaxonRecord>, ClientError>;
    fn classification(&self, taxon_id: u64) -> Result<TaxonomicLineage, ClientError>;
    fn attributes(&self, taxon_id: u64) -> Result<Vec<TaxonAttribute>, ClientError>;
}

pub trait GazetteerSource: Send + Sync {
    fn search_by_name(&self, name: &str) -> Result<Vec<GazetteerRecord>, ClientError>;
    fn fetch_by_id(&self, id: u64) -> Result<Option<GazetteerRecord>, ClientError>;
    /// Boundary geometry as WKT
    fn fetch_boundary(&self, id: u64) -> Result<Option<String>, ClientError>;
}

// ---------------------------------------------------------------------------
// Lenient field extraction (upstream payloads vary in key names and types)
// ---------------------------------------------------------------------------

pub(crate) fn field_str(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match map.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

pub(crate) fn field_f64(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match map.get(*k) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
    .filter(|v: &f64| v.is_finite())
}

pub(crate) fn field_u64(map: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| match map.get(*k) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

pub(crate) fn field_i32(map: &Map<String, Value>, keys: &[&str]) -> Option<i32> {
    keys.iter().find_map(|k| match map.get(*k) {
        Some(Value::Number(n)) => n.as_i64().and_then(|v| i32::try_from(v).ok()),
        // "1995-06-14" style dates: take the year
        Some(Value::String(s)) => s.trim().get(..4).and_then(|y| y.parse().ok()),
        _ => None,
    })
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lenient_fields() {
        let map = json!({
            "AphiaID": "127160",
            "area": 12.5,
            "year": "1995-06-14",
            "name": "  ",
            "alt_name": "Reserve",
            "bad": "NaN"
        });
        let map = map.as_object().unwrap();

        assert_eq!(field_u64(map, &["aphiaID", "AphiaID"]), Some(127160));
        assert_eq!(field_f64(map, &["area"]), Some(12.5));
        assert_eq!(field_f64(map, &["bad"]), None);
        assert_eq!(field_i32(map, &["year"]), Some(1995));
        assert_eq!(field_str(map, &["name", "alt_name"]), Some("Reserve".to_string()));
    }

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("https://a.org/v3/", "/occurrence"), "https://a.org/v3/occurrence");
    }
}
