//! # Challenge Model
//!
//! Parent container of a set of generated tasks. The challenge owns the
//! ingestion configuration (data source, target element type, priority
//! rules) and the externally observable build status.
//!
//! ## Build Status State Machine
//!
//! ```text
//! NotApplicable ──▶ Building ──▶ { Ready | PartiallyLoaded | Failed }
//! ```
//!
//! `DeletingTasks` is entered by an external bulk-delete operation, never by
//! this pipeline. Every build exit path persists a terminal status; the
//! status field is also the (advisory) guard against concurrent rebuilds.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::task::TaskPriority;
use crate::rules::RuleNode;

/// Where a challenge's tasks come from. At most one source is configured;
/// a challenge without a source is skipped by the build pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationSource {
    /// Overpass QL query posted to the configured provider
    OverpassQuery(String),
    /// URL of a remote GeoJSON document, optionally paginated
    RemoteGeoJson(String),
    /// GeoJSON payload uploaded with the challenge
    InlineGeoJson(String),
}

/// OSM element types accepted from an Overpass response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OsmElementType {
    Node,
    Way,
    Relation,
}

impl OsmElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Way => "way",
            Self::Relation => "relation",
        }
    }
}

impl fmt::Display for OsmElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OsmElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(Self::Node),
            "way" => Ok(Self::Way),
            "relation" => Ok(Self::Relation),
            _ => Err(format!("Invalid OSM element type: {s}")),
        }
    }
}

/// Build status of a challenge's task set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// No build has been requested
    NotApplicable,
    /// Ingestion is running on a background worker
    Building,
    /// All candidate items materialized successfully
    Ready,
    /// The build failed before any terminal result
    Failed,
    /// The build finished but some items were dropped
    PartiallyLoaded,
    /// An external bulk task deletion is in progress
    DeletingTasks,
}

impl BuildStatus {
    /// Check if this status ends a build (no further transitions from the
    /// pipeline itself)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ready | Self::Failed | Self::PartiallyLoaded)
    }

    /// Check if a build is currently running
    pub fn is_building(&self) -> bool {
        matches!(self, Self::Building)
    }

    /// Integer code persisted by the external store
    pub fn code(&self) -> i32 {
        match self {
            Self::NotApplicable => 0,
            Self::Building => 1,
            Self::Ready => 2,
            Self::Failed => 3,
            Self::PartiallyLoaded => 4,
            Self::DeletingTasks => 5,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::NotApplicable),
            1 => Some(Self::Building),
            2 => Some(Self::Ready),
            3 => Some(Self::Failed),
            4 => Some(Self::PartiallyLoaded),
            5 => Some(Self::DeletingTasks),
            _ => None,
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotApplicable => write!(f, "not_applicable"),
            Self::Building => write!(f, "building"),
            Self::Ready => write!(f, "ready"),
            Self::Failed => write!(f, "failed"),
            Self::PartiallyLoaded => write!(f, "partially_loaded"),
            Self::DeletingTasks => write!(f, "deleting_tasks"),
        }
    }
}

impl std::str::FromStr for BuildStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_applicable" => Ok(Self::NotApplicable),
            "building" => Ok(Self::Building),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            "partially_loaded" => Ok(Self::PartiallyLoaded),
            "deleting_tasks" => Ok(Self::DeletingTasks),
            _ => Err(format!("Invalid build status: {s}")),
        }
    }
}

/// A challenge owning zero or more generated tasks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: i64,
    pub name: String,
    /// Data source the tasks are built from; `None` means rebuild is a no-op
    pub creation_source: Option<CreationSource>,
    /// Tag or field name preferred as the stable external task identifier
    pub osm_id_property: Option<String>,
    /// Required OSM element type; a mismatched element fails the batch
    pub overpass_target_type: Option<OsmElementType>,
    pub build_status: BuildStatus,
    pub status_message: Option<String>,
    pub high_priority_rule: Option<RuleNode>,
    pub medium_priority_rule: Option<RuleNode>,
    pub low_priority_rule: Option<RuleNode>,
    /// Fallback tier when no priority rule matches
    pub default_priority: TaskPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Challenge {
    /// Create a challenge with no source and default status, for embedders
    /// and tests that fill in fields afterwards
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            creation_source: None,
            osm_id_property: None,
            overpass_target_type: None,
            build_status: BuildStatus::NotApplicable,
            status_message: None,
            high_priority_rule: None,
            medium_priority_rule: None,
            low_priority_rule: None,
            default_priority: TaskPriority::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The priority cascade as an ordered list: high, then medium, then low.
    /// Classification walks this list and the first matching rule wins.
    pub fn priority_cascade(&self) -> [(TaskPriority, Option<&RuleNode>); 3] {
        [
            (TaskPriority::High, self.high_priority_rule.as_ref()),
            (TaskPriority::Medium, self.medium_priority_rule.as_ref()),
            (TaskPriority::Low, self.low_priority_rule.as_ref()),
        ]
    }
}
