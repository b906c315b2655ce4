//! Gazetteer Client (Marine Regions REST)
//!
//! Endpoints used:
//! - `GET /getGazetteerRecordsByName.json/{name}/`
//! - `GET /getGazetteerRecordByMRGID.json/{id}/`
//! - `GET /getGazetteerGeometries.json/{id}/` (boundary WKT)

use super::retry::{as_list, as_map, ResilientHttp};
use super::{field_f64, field_i32, field_str, field_u64, join_url, GazetteerSource};
use crate::error::ClientError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalised gazetteer candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GazetteerRecord {
    pub id: Option<u64>,
    pub name: String,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub area_km2: Option<f64>,
    pub year: Option<i32>,
}

impl GazetteerRecord {
    pub fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        Some(Self {
            id: field_u64(map, &["MRGID", "id", "mrgid"]),
            name: field_str(map, &["preferredGazetteerName", "name"])?,
            country: field_str(map, &["country", "sovereign", "territory"]),
            latitude: field_f64(map, &["latitude", "lat"]),
            longitude: field_f64(map, &["longitude", "lon", "lng"]),
            area_km2: field_f64(map, &["area_km2", "area", "rep_area"]),
            year: field_i32(map, &["year", "designation_year", "status_yr"]),
        })
    }
}

pub struct GazetteerClient {
    http: ResilientHttp,
    base_url: String,
}

impl GazetteerClient {
    pub fn new(http: ResilientHttp, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

impl GazetteerSource for GazetteerClient {
    fn search_by_name(&self, name: &str) -> Result<Vec<GazetteerRecord>, ClientError> {
        let path = format!("getGazetteerRecordsByName.json/{}/", urlencoding::encode(name.trim()));
        let url = join_url(&self.base_url, &path);
        Ok(as_list(self.http.get_json(&url, &[])?)
            .iter()
            .filter_map(GazetteerRecord::from_value)
            .collect())
    }

    fn fetch_by_id(&self, id: u64) -> Result<Option<GazetteerRecord>, ClientError> {
        let url = join_url(&self.base_url, &format!("getGazetteerRecordByMRGID.json/{}/", id));
        let payload = Value::Object(as_map(self.http.get_json(&url, &[])?));
        Ok(GazetteerRecord::from_value(&payload))
    }

    fn fetch_boundary(&self, id: u64) -> Result<Option<String>, ClientError> {
        let url = join_url(&self.base_url, &format!("getGazetteerGeometries.json/{}/", id));
        let payload = self.http.get_json(&url, &[])?;

        // Either a single object or a list of geometry objects
        let rows = match payload {
            Value::Object(map) => vec![Value::Object(map)],
            other => as_list(other),
        };
        Ok(rows.iter().find_map(|row| {
            let map = row.as_object()?;
            field_str(map, &["the_geom", "wkt", "geometry"])
        }))
    }
}

/// Pick the best candidate for a site name: exact (case-insensitive) match
/// first, else the first row.
pub fn best_match<'a>(
    candidates: &'a [GazetteerRecord],
    name: &str,
) -> Option<&'a GazetteerRecord> {
    let wanted = name.trim().to_lowercase();
    candidates
        .iter()
        .find(|c| c.name.to_lowercase() == wanted)
        .or_else(|| candidates.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::retry::testing::*;

    #[test]
    fn test_search_by_name_encodes_and_parses() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(
            r#"[{"MRGID": 8364, "preferredGazetteerName": "Cabo Pulmo", "latitude": 23.42, "longitude": -109.42,
                 "country": "Mexico", "area_km2": 71.11, "year": 1995}]"#,
        )]);
        let http = ResilientHttp::new(transport.clone(), no_backoff(1));
        let client = GazetteerClient::new(http, "https://mr.test/rest");

        let records = client.search_by_name("Cabo Pulmo").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, Some(8364));
        assert_eq!(records[0].year, Some(1995));
        assert_eq!(
            transport.urls.lock().unwrap()[0],
            "https://mr.test/rest/getGazetteerRecordsByName.json/Cabo%20Pulmo/"
        );
    }

    #[test]
    fn test_fetch_by_id_empty_is_none() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok("")]);
        let http = ResilientHttp::new(transport, no_backoff(1));
        let client = GazetteerClient::new(http, "https://mr.test/rest");
        assert!(client.fetch_by_id(1).unwrap().is_none());
    }

    #[test]
    fn test_fetch_boundary() {
        let transport = ScriptedTransport::new(vec![ScriptedTransport::ok(
            r#"[{"MRGID": 8364, "the_geom": "POLYGON((-109.5 23.3,-109.3 23.3,-109.3 23.5,-109.5 23.3))"}]"#,
        )]);
        let http = ResilientHttp::new(transport, no_backoff(1));
        let client = GazetteerClient::new(http, "https://mr.test/rest");
        let wkt = client.fetch_boundary(8364).unwrap().unwrap();
        assert!(wkt.starts_with("POLYGON"));
    }

    #[test]
    fn test_best_match_prefers_exact() {
        let candidates = vec![
            GazetteerRecord { name: "Cabo Pulmo Bay".into(), ..Default::default() },
            GazetteerRecord { name: "Cabo Pulmo".into(), ..Default::default() },
        ];
        assert_eq!(best_match(&candidates, "cabo pulmo").unwrap().name, "Cabo Pulmo");
        assert_eq!(best_match(&candidates, "Other").unwrap().name, "Cabo Pulmo Bay");
        assert!(best_match(&[], "x").is_none());
    }
}
