//! Occurrence Client (OBIS v3)
//!
//! Endpoints used:
//! - `GET /occurrence?geometry=<WKT>&size=N`
//! - `GET /area` then `GET /occurrence?areaid=<id>&size=N` for area names
//! - `GET /checklist?geometry=<WKT>&size=N`

use super::retry::{as_list, query_pairs, ResilientHttp};
use super::{field_str, field_u64, join_url, AreaFilter, OccurrenceSource};
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One occurrence (or checklist) row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    pub taxon_id: Option<u64>,
    pub scientific_name: String,
    pub vernacular_name: Option<String>,
}

impl OccurrenceRecord {
    /// Parse one upstream row; rows without a scientific name are dropped
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        let scientific_name = field_str(map, &["scientificName", "scientific_name", "species"])?;
        Some(Self {
            taxon_id: field_u64(map, &["aphiaID", "taxonID", "taxon_id", "AphiaID"]),
            scientific_name,
            vernacular_name: field_str(map, &["vernacularName", "vernacular_name"]),
        })
    }
}

pub struct OccurrenceClient {
    http: ResilientHttp,
    base_url: String,
}

impl OccurrenceClient {
    pub fn new(http: ResilientHttp, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Occurrences within a WKT geometry
    pub fn search_by_geometry(
        &self,
        wkt: &str,
        limit: usize,
    ) -> Result<Vec<OccurrenceRecord>, ClientError> {
        let url = join_url(&self.base_url, "occurrence");
        let query = query_pairs(&[("geometry", wkt.to_string()), ("size", limit.to_string())]);
        Ok(parse_records(self.http.get_json(&url, &query)?))
    }

    /// Occurrences within a named OBIS area.
    ///
    /// Resolves the name against the area listing (exact match preferred,
    /// then substring). Unknown names return an empty list.
    pub fn search_by_area_name(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Vec<OccurrenceRecord>, ClientError> {
        let Some(area_id) = self.resolve_area_id(name)? else {
            tracing::debug!("No OBIS area matches '{}'", name);
            return Ok(Vec::new());
        };

        let url = join_url(&self.base_url, "occurrence");
        let query = query_pairs(&[("areaid", area_id.to_string()), ("size", limit.to_string())]);
        Ok(parse_records(self.http.get_json(&url, &query)?))
    }

    /// Distinct taxa within a WKT geometry
    pub fn checklist(&self, wkt: &str, limit: usize) -> Result<Vec<OccurrenceRecord>, ClientError> {
        let url = join_url(&self.base_url, "checklist");
        let query = query_pairs(&[("geometry", wkt.to_string()), ("size", limit.to_string())]);
        Ok(parse_records(self.http.get_json(&url, &query)?))
    }

    fn resolve_area_id(&self, name: &str) -> Result<Option<u64>, ClientError> {
        let url = join_url(&self.base_url, "area");
        let areas = as_list(self.http.get_json(&url, &[])?);
        let wanted = name.trim().to_lowercase();

        let candidates: Vec<(u64, String)> = areas
            .iter()
            .filter_map(|a| {
                let map = a.as_object()?;
                Some((field_u64(map, &["id"])?, field_str(map, &["name"])?.to_lowercase()))
            })
            .collect();

        let exact = candidates.iter().find(|(_, n)| *n == wanted);
        let partial = || {
            candidates
                .iter()
                .find(|(_, n)| n.contains(&wanted) || wanted.contains(n.as_str()))
        };
        Ok(exact.or_else(partial).map(|(id, _)| *id))
    }
}

impl OccurrenceSource for OccurrenceClient {
    fn search_occurrences(
        &self,
        filter: &AreaFilter,
        limit: usize,
    ) -> Result<Vec<OccurrenceRecord>, ClientError> {
        match filter {
            AreaFilter::Geometry(wkt) => self.search_by_geometry(wkt, limit),
            AreaFilter::AreaName(name) => self.search_by_area_name(name, limit),
        }
    }
}

fn parse_records(payload: Value) -> Vec<OccurrenceRecord> {
    as_list(payload)
        .iter()
        .filter_map(OccurrenceRecord::from_value)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::retry::testing::*;

    #[test]
    fn test_geometry_search_parses_results() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(
            r#"{"total": 3, "results": [
                {"scientificName": "Acropora palmata", "aphiaID": 206989, "vernacularName": "Elkhorn coral"},
                {"scientificName": "Thalassia testudinum", "aphiaID": "374720"},
                {"aphiaID": 1}
            ]}"#,
        )]);
        let http = ResilientHttp::new(transport, no_backoff(3));
        let client = OccurrenceClient::new(http, "https://obis.test/v3");

        let records = client.search_by_geometry("POLYGON((0 0,1 0,1 1,0 0))", 100).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].taxon_id, Some(206989));
        assert_eq!(records[0].vernacular_name.as_deref(), Some("Elkhorn coral"));
        assert_eq!(records[1].taxon_id, Some(374720));
    }

    #[test]
    fn test_area_name_resolves_then_queries() {
        let transport = ScriptedTransport::new(vec![
            ScriptedTransport::ok(r#"{"results": [{"id": 11, "name": "Great Barrier Reef"}, {"id": 12, "name": "Cabo Pulmo"}]}"#),
            ScriptedTransport::ok(r#"{"results": [{"scientificName": "Pocillopora verrucosa", "aphiaID": 206953}]}"#),
        ]);
        let http = ResilientHttp::new(transport.clone(), no_backoff(3));
        let client = OccurrenceClient::new(http, "https://obis.test/v3");

        let records = client
            .search_occurrences(&AreaFilter::AreaName("cabo pulmo".into()), 50)
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(transport.call_count(), 2);
        assert_eq!(transport.urls.lock().unwrap()[0], "https://obis.test/v3/area");
    }

    #[test]
    fn test_unknown_area_is_empty_not_error() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(r#"{"results": []}"#)]);
        let http = ResilientHttp::new(transport.clone(), no_backoff(3));
        let client = OccurrenceClient::new(http, "https://obis.test/v3");

        let records = client.search_by_area_name("Nowhere Marine Park", 50).unwrap();
        assert!(records.is_empty());
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_outage_surfaces_connection_error() {
        let transport = ScriptedTransport::new(vec![]);
        let http = ResilientHttp::new(transport.clone(), no_backoff(2));
        let client = OccurrenceClient::new(http, "https://obis.test/v3");

        assert!(client.checklist("POLYGON EMPTY", 10).is_err());
        assert_eq!(transport.call_count(), 2);
    }
}
