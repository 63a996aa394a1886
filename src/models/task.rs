//! # Task Model
//!
//! One unit of verification work generated under a challenge: a GeoJSON
//! geometry, a flattened property bag, and a computed priority tier.
//!
//! Tasks are created once per distinct resolved name under a challenge;
//! later ingestion runs with the same name replace geometry and properties
//! in place rather than duplicating the task.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Priority tier assigned to a task by the challenge's rule cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Work on these tasks first
    High,
    /// Standard priority
    Medium,
    /// Work on these tasks last
    Low,
}

impl TaskPriority {
    /// Integer code persisted by the external store
    pub fn code(&self) -> i32 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::High),
            1 => Some(Self::Medium),
            2 => Some(Self::Low),
            _ => None,
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::High
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "low" => Ok(Self::Low),
            _ => Err(format!("Invalid task priority: {s}")),
        }
    }
}

/// Point used for spatial indexing, in GeoJSON axis order (x = lon, y = lat)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Render as a GeoJSON `Point` geometry
    pub fn to_geojson(&self) -> Value {
        json!({ "type": "Point", "coordinates": [self.x, self.y] })
    }

    /// Parse a GeoJSON `Point` geometry
    pub fn from_geojson(value: &Value) -> Option<Self> {
        if value.get("type").and_then(Value::as_str) != Some("Point") {
            return None;
        }
        let coordinates = value.get("coordinates")?.as_array()?;
        let x = coordinates.first()?.as_f64()?;
        let y = coordinates.get(1)?.as_f64()?;
        Some(Self { x, y })
    }
}

/// A persisted task under a challenge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    /// Stable external identifier when resolvable, else a generated UUID;
    /// doubles as the upsert key within the parent challenge
    pub name: String,
    pub parent_challenge_id: i64,
    /// GeoJSON FeatureCollection string wrapping the task's features
    pub geometry_collection: String,
    /// Representative point of the geometry, used for spatial indexing and
    /// bounds-type priority rules
    pub location: Option<Point>,
    pub priority: TaskPriority,
    /// Flattened key/value tag map read back from the geometry's properties
    pub properties: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
