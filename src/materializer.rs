//! # Task Materializer
//!
//! Turns a resolved (name, geometry, properties) triple into a persisted
//! task. Materialization is idempotent: the `(challenge_id, name)` pair is
//! the upsert key, so re-ingesting a source replaces geometry and
//! properties in place instead of duplicating tasks. A creation race lost
//! to a concurrent upsert is skipped silently rather than surfaced.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::geojson;
use crate::models::Task;
use crate::stores::TaskStore;

/// Result of materializing one candidate item
#[derive(Debug, Clone)]
pub enum MaterializeOutcome {
    /// The task was created or updated
    Persisted(Task),
    /// A concurrent writer handled this name first
    Skipped,
}

impl MaterializeOutcome {
    pub fn task(&self) -> Option<&Task> {
        match self {
            Self::Persisted(task) => Some(task),
            Self::Skipped => None,
        }
    }
}

/// Persists candidate items as tasks and enforces the per-challenge cap
#[derive(Clone)]
pub struct TaskMaterializer {
    task_store: Arc<dyn TaskStore>,
    max_tasks_per_challenge: usize,
}

impl TaskMaterializer {
    pub fn new(task_store: Arc<dyn TaskStore>, max_tasks_per_challenge: usize) -> Self {
        Self {
            task_store,
            max_tasks_per_challenge,
        }
    }

    /// Materialize a resolved geometry plus property bag: wrap them into a
    /// single-feature FeatureCollection and upsert under `name`.
    pub async fn materialize(
        &self,
        name: &str,
        geometry: &Value,
        properties: &HashMap<String, String>,
        challenge_id: i64,
    ) -> Result<MaterializeOutcome> {
        let geometry_json = geojson::wrap_feature_collection(geometry, properties);
        let location = geojson::representative_point(geometry);
        self.persist(challenge_id, name, &geometry_json, properties, location)
            .await
    }

    /// Materialize a whole document as one task, passing the document
    /// through verbatim as the task's geometry collection.
    pub async fn materialize_single(
        &self,
        name: &str,
        document: &Value,
        challenge_id: i64,
    ) -> Result<MaterializeOutcome> {
        // Properties come from the document itself, or from its first
        // feature when the document is a collection
        let property_source = document
            .get("features")
            .and_then(Value::as_array)
            .and_then(|features| features.first())
            .unwrap_or(document);
        let properties = geojson::flatten_properties(property_source);
        let location = geojson::representative_point(document);
        self.persist(
            challenge_id,
            name,
            &document.to_string(),
            &properties,
            location,
        )
        .await
    }

    /// Fail unless `incoming` more tasks fit under the configured cap.
    /// The error message distinguishes a first batch that is rejected
    /// outright from a later page that stops the challenge growing.
    pub async fn check_capacity(&self, challenge_id: i64, incoming: usize) -> Result<()> {
        let current = self.task_store.count_tasks(challenge_id).await?;
        if current + incoming > self.max_tasks_per_challenge {
            let message = if current == 0 {
                format!(
                    "cannot create {incoming} tasks for challenge {challenge_id}: \
                     the limit is {} tasks per challenge",
                    self.max_tasks_per_challenge
                )
            } else {
                format!(
                    "challenge {challenge_id} already holds {current} tasks; \
                     adding {incoming} more would exceed the limit of {}",
                    self.max_tasks_per_challenge
                )
            };
            return Err(PipelineError::Capacity(message));
        }
        Ok(())
    }

    async fn persist(
        &self,
        challenge_id: i64,
        name: &str,
        geometry_json: &str,
        properties: &HashMap<String, String>,
        location: Option<crate::models::Point>,
    ) -> Result<MaterializeOutcome> {
        match self
            .task_store
            .upsert_by_name(challenge_id, name, geometry_json, properties, location)
            .await
        {
            Ok(task) => Ok(MaterializeOutcome::Persisted(task)),
            Err(PipelineError::UniquenessViolation(detail)) => {
                debug!(
                    "challenge {}: task '{}' already created concurrently ({}), skipping",
                    challenge_id, name, detail
                );
                Ok(MaterializeOutcome::Skipped)
            }
            Err(error) => Err(error),
        }
    }
}
