//! # Task Name Resolution
//!
//! Derives a stable identifier for a candidate feature or element, used both
//! as the task's display name and as its upsert key. Resolution never fails:
//! when nothing identifies the candidate, a random UUID is generated. That
//! means repeated ingestion of the same document without a resolvable id
//! produces new tasks each run — an accepted, documented limitation.

use serde_json::Value;
use uuid::Uuid;

use crate::models::Challenge;

/// Generic identifier fields searched in order when no id property is
/// configured on the challenge
const NAME_FIELDS: [&str; 5] = ["id", "@id", "osmid", "osm_id", "name"];

/// Resolve the task name for a candidate feature, element, or collection.
///
/// When the challenge configures `osm_id_property`, only that field is
/// consulted (candidate's own fields first, then its `properties`); if it is
/// not found anywhere, resolution falls straight through to a generated
/// UUID rather than the generic heuristics.
pub fn resolve_name(candidate: &Value, challenge: &Challenge) -> String {
    let resolved = match &challenge.osm_id_property {
        Some(property) => find_configured(candidate, property),
        None => find_generic(candidate),
    };
    resolved.unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn find_configured(candidate: &Value, property: &str) -> Option<String> {
    // A FeatureCollection is searched through its first feature only
    if let Some(features) = candidate.get("features").and_then(Value::as_array) {
        return features
            .first()
            .and_then(|feature| find_configured(feature, property));
    }
    field_string(candidate, property).or_else(|| {
        candidate
            .get("properties")
            .and_then(|properties| field_string(properties, property))
    })
}

fn find_generic(candidate: &Value) -> Option<String> {
    if let Some(features) = candidate.get("features").and_then(Value::as_array) {
        return features.first().and_then(find_generic);
    }
    NAME_FIELDS
        .iter()
        .find_map(|field| field_string(candidate, field))
        .or_else(|| {
            candidate.get("properties").and_then(|properties| {
                NAME_FIELDS
                    .iter()
                    .find_map(|field| field_string(properties, field))
            })
        })
}

/// First present non-null value wins; numbers are stringified
fn field_string(container: &Value, field: &str) -> Option<String> {
    match container.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
