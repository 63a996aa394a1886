//! # Background Executor Abstraction
//!
//! The orchestrator's entry point returns as soon as the challenge is
//! flipped to `Building`; the rest of the build runs on whatever executor
//! the embedder supplies. Tests substitute [`InlineExecutor`] to run the
//! build synchronously and assert on terminal state without timing races.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

/// A unit of background work. Jobs own everything they touch and report
/// outcomes through the stores, never through a return value.
pub type BoxedJob = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Where the orchestrator submits the asynchronous remainder of a build
#[async_trait]
pub trait BackgroundExecutor: Send + Sync {
    async fn submit(&self, job: BoxedJob);
}

/// Spawns jobs onto the tokio runtime (fire-and-forget)
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

#[async_trait]
impl BackgroundExecutor for TokioExecutor {
    async fn submit(&self, job: BoxedJob) {
        tokio::spawn(job);
    }
}

/// Awaits jobs on the caller's task, completing the whole build before
/// `submit` returns. Deterministic, for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

#[async_trait]
impl BackgroundExecutor for InlineExecutor {
    async fn submit(&self, job: BoxedJob) {
        job.await;
    }
}
