//! # In-Memory Stores
//!
//! Mutex-guarded store implementations for tests and embedders without a
//! relational backend. They enforce the same observable contract as a real
//! store: name-keyed upserts, paged listing in insertion order, and the
//! incomplete-task bulk removal used by replacement rebuilds.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{PipelineError, Result};
use crate::models::{BuildStatus, Challenge, Point, Task, TaskPriority};
use crate::stores::{ChallengeStore, TaskStore};

#[derive(Debug, Default)]
struct TaskStoreState {
    next_id: i64,
    tasks: Vec<Task>,
    completed: HashSet<i64>,
}

/// In-memory [`TaskStore`]
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    state: Mutex<TaskStoreState>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a challenge's tasks, in insertion order
    pub fn tasks_for(&self, challenge_id: i64) -> Vec<Task> {
        let state = self.state.lock().expect("task store lock poisoned");
        state
            .tasks
            .iter()
            .filter(|task| task.parent_challenge_id == challenge_id)
            .cloned()
            .collect()
    }

    /// Mark a task complete so replacement rebuilds keep it
    pub fn mark_complete(&self, task_id: i64) {
        let mut state = self.state.lock().expect("task store lock poisoned");
        state.completed.insert(task_id);
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn upsert_by_name(
        &self,
        challenge_id: i64,
        name: &str,
        geometry_json: &str,
        properties: &HashMap<String, String>,
        location: Option<Point>,
    ) -> Result<Task> {
        let mut state = self.state.lock().expect("task store lock poisoned");
        let now = Utc::now();

        if let Some(existing) = state
            .tasks
            .iter_mut()
            .find(|task| task.parent_challenge_id == challenge_id && task.name == name)
        {
            existing.geometry_collection = geometry_json.to_string();
            existing.properties = properties.clone();
            existing.location = location;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let task = Task {
            id: state.next_id,
            name: name.to_string(),
            parent_challenge_id: challenge_id,
            geometry_collection: geometry_json.to_string(),
            location,
            priority: TaskPriority::default(),
            properties: properties.clone(),
            created_at: now,
            updated_at: now,
        };
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn list_tasks_page(
        &self,
        challenge_id: i64,
        page_size: usize,
        offset: usize,
    ) -> Result<Vec<Task>> {
        let state = self.state.lock().expect("task store lock poisoned");
        Ok(state
            .tasks
            .iter()
            .filter(|task| task.parent_challenge_id == challenge_id)
            .skip(offset)
            .take(page_size)
            .cloned()
            .collect())
    }

    async fn update_priority(&self, task_id: i64, priority: TaskPriority) -> Result<()> {
        let mut state = self.state.lock().expect("task store lock poisoned");
        let task = state
            .tasks
            .iter_mut()
            .find(|task| task.id == task_id)
            .ok_or_else(|| PipelineError::Store(format!("unknown task id {task_id}")))?;
        task.priority = priority;
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn remove_incomplete_tasks(&self, challenge_id: i64) -> Result<usize> {
        let mut state = self.state.lock().expect("task store lock poisoned");
        let completed = state.completed.clone();
        let before = state.tasks.len();
        state
            .tasks
            .retain(|task| task.parent_challenge_id != challenge_id || completed.contains(&task.id));
        Ok(before - state.tasks.len())
    }

    async fn count_tasks(&self, challenge_id: i64) -> Result<usize> {
        let state = self.state.lock().expect("task store lock poisoned");
        Ok(state
            .tasks
            .iter()
            .filter(|task| task.parent_challenge_id == challenge_id)
            .count())
    }
}

#[derive(Debug, Default)]
struct ChallengeStoreState {
    challenges: HashMap<i64, Challenge>,
    refreshed: Vec<(i64, bool)>,
}

/// In-memory [`ChallengeStore`]
#[derive(Debug, Default)]
pub struct MemoryChallengeStore {
    state: Mutex<ChallengeStoreState>,
}

impl MemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, challenge: Challenge) {
        let mut state = self.state.lock().expect("challenge store lock poisoned");
        state.challenges.insert(challenge.id, challenge);
    }

    /// Current status and message, for assertions
    pub fn status_of(&self, challenge_id: i64) -> Option<(BuildStatus, Option<String>)> {
        let state = self.state.lock().expect("challenge store lock poisoned");
        state
            .challenges
            .get(&challenge_id)
            .map(|challenge| (challenge.build_status, challenge.status_message.clone()))
    }

    /// Refresh markers recorded by `mark_tasks_refreshed`
    pub fn refresh_log(&self) -> Vec<(i64, bool)> {
        let state = self.state.lock().expect("challenge store lock poisoned");
        state.refreshed.clone()
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn get(&self, challenge_id: i64) -> Result<Option<Challenge>> {
        let state = self.state.lock().expect("challenge store lock poisoned");
        Ok(state.challenges.get(&challenge_id).cloned())
    }

    async fn update_status(
        &self,
        challenge_id: i64,
        status: BuildStatus,
        message: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("challenge store lock poisoned");
        let challenge = state
            .challenges
            .get_mut(&challenge_id)
            .ok_or_else(|| PipelineError::Store(format!("unknown challenge id {challenge_id}")))?;
        challenge.build_status = status;
        challenge.status_message = message;
        challenge.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_tasks_refreshed(
        &self,
        challenge_id: i64,
        reset_completion: bool,
    ) -> Result<()> {
        let mut state = self.state.lock().expect("challenge store lock poisoned");
        state.refreshed.push((challenge_id, reset_completion));
        Ok(())
    }
}
