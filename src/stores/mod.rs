//! # External Store Interfaces
//!
//! The relational storage layer is an external collaborator; the pipeline
//! only consumes the operations below. Implementations are expected to be
//! cheap to clone behind `Arc` and safe to call from background workers.

pub mod memory;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{BuildStatus, Challenge, Point, Task, TaskPriority};

/// Task persistence operations consumed by the pipeline
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create-or-update a task keyed on `(challenge_id, name)`. An existing
    /// task's geometry, properties, and location are replaced in place.
    ///
    /// Implementations report a lost creation race (another writer created
    /// the name concurrently) as [`PipelineError::UniquenessViolation`];
    /// callers treat that as already handled, not as a failure.
    ///
    /// [`PipelineError::UniquenessViolation`]: crate::error::PipelineError::UniquenessViolation
    async fn upsert_by_name(
        &self,
        challenge_id: i64,
        name: &str,
        geometry_json: &str,
        properties: &HashMap<String, String>,
        location: Option<Point>,
    ) -> Result<Task>;

    /// Fetch one page of a challenge's tasks. `offset` counts tasks, not
    /// pages; a page shorter than `page_size` is the last one.
    async fn list_tasks_page(
        &self,
        challenge_id: i64,
        page_size: usize,
        offset: usize,
    ) -> Result<Vec<Task>>;

    async fn update_priority(&self, task_id: i64, priority: TaskPriority) -> Result<()>;

    /// Bulk-remove the challenge's tasks that no user has completed yet.
    /// Returns the number of tasks removed.
    async fn remove_incomplete_tasks(&self, challenge_id: i64) -> Result<usize>;

    async fn count_tasks(&self, challenge_id: i64) -> Result<usize>;
}

/// Challenge persistence operations consumed by the pipeline
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn get(&self, challenge_id: i64) -> Result<Option<Challenge>>;

    async fn update_status(
        &self,
        challenge_id: i64,
        status: BuildStatus,
        message: Option<String>,
    ) -> Result<()>;

    /// Record that the challenge's tasks were refreshed by an ingestion
    /// run, optionally resetting the tasks' completion flags.
    async fn mark_tasks_refreshed(&self, challenge_id: i64, reset_completion: bool)
        -> Result<()>;
}
