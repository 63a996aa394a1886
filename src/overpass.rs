//! # Overpass Integration
//!
//! Typed model of the Overpass API's JSON wire format, query rewriting that
//! guarantees a usable settings prologue, and recursive geometry extraction
//! from decoded elements.
//!
//! Overpass elements are not GeoJSON: nodes carry bare lat/lon, ways carry
//! an ordered lat/lon array, and relations nest member elements to arbitrary
//! depth. Extraction reconstructs GeoJSON geometries from that shape,
//! flipping coordinates into GeoJSON (lon, lat) order.

use serde::Deserialize;
use serde_json::{json, Value};

/// Decoded Overpass response body
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// A lat/lon pair as Overpass emits it
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

/// One node, way, or relation from an Overpass response
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: String,
    #[serde(default)]
    pub id: Option<i64>,
    /// Node coordinates
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    /// Present in "out center" mode for ways and relations
    #[serde(default)]
    pub center: Option<LatLon>,
    /// Ordered way geometry in "out geom" mode
    #[serde(default)]
    pub geometry: Option<Vec<LatLon>>,
    /// Relation members, possibly nested relations
    #[serde(default)]
    pub members: Option<Vec<OverpassMember>>,
    #[serde(default)]
    pub tags: Option<serde_json::Map<String, Value>>,
}

/// A relation member. Carries the same geometric payload as an element but
/// uses `ref` for the member's id and never carries tags of its own.
#[derive(Debug, Clone, Deserialize)]
pub struct OverpassMember {
    #[serde(rename = "type")]
    pub member_type: String,
    #[serde(rename = "ref", default)]
    pub member_ref: Option<i64>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
    #[serde(default)]
    pub geometry: Option<Vec<LatLon>>,
    #[serde(default)]
    pub members: Option<Vec<OverpassMember>>,
}

impl OverpassMember {
    /// View the member as a standalone element so relation recursion can
    /// reuse the element extraction rules.
    fn to_element(&self) -> OverpassElement {
        OverpassElement {
            element_type: self.member_type.clone(),
            id: self.member_ref,
            lat: self.lat,
            lon: self.lon,
            center: None,
            geometry: self.geometry.clone(),
            members: self.members.clone(),
            tags: None,
        }
    }
}

impl OverpassElement {
    /// The element's candidate JSON used for name resolution: its id plus
    /// its tags as a `properties` bag.
    pub fn to_candidate(&self) -> Value {
        let mut candidate = serde_json::Map::new();
        if let Some(id) = self.id {
            candidate.insert("id".to_string(), json!(id));
        }
        candidate.insert(
            "properties".to_string(),
            Value::Object(self.tags.clone().unwrap_or_default()),
        );
        Value::Object(candidate)
    }
}

/// Convert a single Overpass element into a GeoJSON geometry.
///
/// Rules in priority order: an explicit `center` wins; then node → Point,
/// way → LineString, relation → GeometryCollection of recursively extracted
/// members. A relation containing only unsupported member types yields an
/// empty collection, not a failure. Anything else yields `None`, which the
/// caller treats as a per-item failure.
pub fn extract_geometry(element: &OverpassElement) -> Option<Value> {
    if let Some(center) = &element.center {
        return Some(point(center.lon, center.lat));
    }

    match element.element_type.as_str() {
        "node" => match (element.lon, element.lat) {
            (Some(lon), Some(lat)) => Some(point(lon, lat)),
            _ => None,
        },
        "way" => element.geometry.as_ref().map(|coordinates| {
            json!({
                "type": "LineString",
                "coordinates": coordinates
                    .iter()
                    .map(|c| json!([c.lon, c.lat]))
                    .collect::<Vec<_>>(),
            })
        }),
        "relation" => {
            let members = element.members.as_deref().unwrap_or(&[]);
            let geometries: Vec<Value> = members
                .iter()
                .filter_map(|member| extract_geometry(&member.to_element()))
                .collect();
            Some(json!({
                "type": "GeometryCollection",
                "geometries": geometries,
            }))
        }
        _ => None,
    }
}

fn point(lon: f64, lat: f64) -> Value {
    json!({ "type": "Point", "coordinates": [lon, lat] })
}

/// Rewrite a user-authored Overpass query so the request is usable:
/// guarantee an `[out:json]` directive and a `[timeout:N]` setting. An
/// explicit `[timeout:N]` already present in the query wins and also
/// governs the HTTP client timeout; otherwise the configured default is
/// injected and used. Returns the rewritten query and the effective
/// timeout in seconds.
pub fn prepare_query(query: &str, default_timeout_secs: u64) -> (String, u64) {
    let trimmed = query.trim();
    let declared_timeout = parse_timeout(trimmed);
    let effective_timeout = declared_timeout.unwrap_or(default_timeout_secs);

    let mut prologue = String::new();
    if !trimmed.contains("[out:json]") {
        prologue.push_str("[out:json]");
    }
    if declared_timeout.is_none() {
        prologue.push_str(&format!("[timeout:{effective_timeout}]"));
    }

    let rewritten = if prologue.is_empty() {
        trimmed.to_string()
    } else if trimmed.starts_with('[') {
        // Existing settings prologue: extend it in place
        format!("{prologue}{trimmed}")
    } else {
        format!("{prologue};{trimmed}")
    };

    (rewritten, effective_timeout)
}

fn parse_timeout(query: &str) -> Option<u64> {
    let start = query.find("[timeout:")? + "[timeout:".len();
    let rest = &query[start..];
    let end = rest.find(']')?;
    rest[..end].trim().parse().ok()
}
