//! # Priority Recomputation Pass
//!
//! After a build reaches a successful terminal state, every task under the
//! challenge is re-classified against the challenge's current rule cascade.
//! The pass pages through tasks in fixed-size batches until a short page
//! and persists a priority only when it differs from the stored value.
//!
//! Rule evaluation errors fail this pass but never alter the challenge's
//! build status; the build already finished by the time this runs.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::models::Challenge;
use crate::rules;
use crate::stores::TaskStore;

/// Outcome counters for one recomputation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecomputeSummary {
    pub scanned: usize,
    pub updated: usize,
}

/// Re-classifies a challenge's tasks in batches
#[derive(Clone)]
pub struct PriorityRecomputer {
    task_store: Arc<dyn TaskStore>,
    batch_size: usize,
}

impl PriorityRecomputer {
    pub fn new(task_store: Arc<dyn TaskStore>, batch_size: usize) -> Self {
        Self {
            task_store,
            batch_size,
        }
    }

    pub async fn recompute(&self, challenge: &Challenge) -> Result<RecomputeSummary> {
        let mut summary = RecomputeSummary::default();
        let mut offset = 0;

        loop {
            let page = self
                .task_store
                .list_tasks_page(challenge.id, self.batch_size, offset)
                .await?;
            let last_page = page.len() < self.batch_size;

            for task in &page {
                summary.scanned += 1;
                let priority = rules::classify_task(challenge, task)?;
                if priority != task.priority {
                    debug!(
                        "challenge {}: task {} priority {} -> {}",
                        challenge.id, task.id, task.priority, priority
                    );
                    self.task_store.update_priority(task.id, priority).await?;
                    summary.updated += 1;
                }
            }

            if last_page {
                break;
            }
            offset += self.batch_size;
        }

        info!(
            "challenge {}: priority recomputation scanned {} tasks, updated {}",
            challenge.id, summary.scanned, summary.updated
        );
        Ok(summary)
    }
}
