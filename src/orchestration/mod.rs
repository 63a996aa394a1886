//! # Build Orchestration
//!
//! Coordinates the asynchronous side of the pipeline: the executor that
//! hosts background builds, the HTTP fetch seam, the build orchestrator
//! itself, and the post-build priority recomputation pass.

pub mod builder;
pub mod executor;
pub mod fetcher;
pub mod priority_pass;

pub use builder::{ChallengeBuildOrchestrator, RebuildOutcome};
pub use executor::{BackgroundExecutor, BoxedJob, InlineExecutor, TokioExecutor};
pub use fetcher::{FetchedPayload, HttpFetcher, RemoteFetcher};
pub use priority_pass::{PriorityRecomputer, RecomputeSummary};
