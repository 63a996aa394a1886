//! # GeoJSON Helpers
//!
//! Small utilities over GeoJSON fragments carried as `serde_json::Value`:
//! flattening a feature's property bag into the string map tasks store,
//! deriving a representative point for spatial indexing, and wrapping a
//! geometry into the single-feature FeatureCollection persisted on a task.

use std::collections::HashMap;

use serde_json::{json, Value};

use crate::models::Point;

/// Flatten a feature's `properties` (or Overpass `tags`) object into a
/// key → string map. Scalar values keep their string form; anything nested
/// is serialized compactly.
pub fn flatten_properties(feature: &Value) -> HashMap<String, String> {
    let bag = feature
        .get("properties")
        .or_else(|| feature.get("tags"))
        .and_then(Value::as_object);
    let Some(map) = bag else {
        return HashMap::new();
    };
    map.iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), stringify(value)))
        .collect()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Derive a representative point for a geometry, feature, or feature
/// collection: the midpoint of the bounding box of every coordinate the
/// fragment contains. Returns `None` when there are no coordinates.
pub fn representative_point(fragment: &Value) -> Option<Point> {
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    collect_coordinates(fragment, &mut |x, y| {
        bounds = Some(match bounds {
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
            None => (x, y, x, y),
        });
    });
    bounds.map(|(min_x, min_y, max_x, max_y)| {
        Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0)
    })
}

fn collect_coordinates(fragment: &Value, visit: &mut impl FnMut(f64, f64)) {
    match fragment {
        Value::Object(map) => {
            if let Some(coordinates) = map.get("coordinates") {
                walk_coordinate_array(coordinates, visit);
            }
            if let Some(geometry) = map.get("geometry") {
                collect_coordinates(geometry, visit);
            }
            for key in ["geometries", "features"] {
                if let Some(Value::Array(items)) = map.get(key) {
                    for item in items {
                        collect_coordinates(item, visit);
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_coordinates(item, visit);
            }
        }
        _ => {}
    }
}

fn walk_coordinate_array(value: &Value, visit: &mut impl FnMut(f64, f64)) {
    if let Value::Array(items) = value {
        if items.len() >= 2 && items[0].is_number() && items[1].is_number() {
            if let (Some(x), Some(y)) = (items[0].as_f64(), items[1].as_f64()) {
                visit(x, y);
            }
        } else {
            for item in items {
                walk_coordinate_array(item, visit);
            }
        }
    }
}

/// Wrap a geometry and its flattened properties into the single-feature
/// FeatureCollection string persisted on a task.
pub fn wrap_feature_collection(geometry: &Value, properties: &HashMap<String, String>) -> String {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "geometry": geometry,
            "properties": properties,
        }]
    })
    .to_string()
}
