#![allow(clippy::doc_markdown)] // Allow technical terms like GeoJSON, Overpass in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Challenge Core
//!
//! Geospatial ingestion pipeline that materializes tasks under a challenge
//! from OpenStreetMap and GeoJSON data sources.
//!
//! ## Overview
//!
//! A challenge declares where its work items come from: an Overpass QL
//! query, a remote GeoJSON URL (optionally paginated), or a GeoJSON payload
//! uploaded with the challenge. The pipeline fetches that source, extracts
//! one geometry per candidate item, resolves a stable per-challenge task
//! name, classifies the task against the challenge's priority rule cascade,
//! and upserts the result through the store traits. A build-status state
//! machine makes progress and partial failure externally observable.
//!
//! ## Architecture
//!
//! Builds run in two phases. The synchronous entry point validates the
//! request and flips the challenge to `Building`; the remainder runs as a
//! fire-and-forget job on a [`orchestration::BackgroundExecutor`]. Every
//! exit path of the background job persists a terminal status: `Ready`
//! when everything loaded, `PartiallyLoaded` when individual items were
//! dropped, `Failed` when the build could not produce a usable result.
//!
//! ## Module Organization
//!
//! - [`models`] - Challenge and task domain types
//! - [`stores`] - Persistence traits plus an in-memory implementation
//! - [`formats`] - GeoJSON payload format detection
//! - [`overpass`] - Overpass wire model, query rewriting, geometry extraction
//! - [`geojson`] - Property flattening and representative points
//! - [`naming`] - Task name resolution
//! - [`rules`] - Priority rule trees and classification
//! - [`materializer`] - Idempotent task persistence with capacity limits
//! - [`orchestration`] - Build orchestrator, executor, fetcher, priority pass
//! - [`config`] - Pipeline configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging initialization
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use challenge_core::config::PipelineConfig;
//! use challenge_core::orchestration::{
//!     ChallengeBuildOrchestrator, HttpFetcher, TokioExecutor,
//! };
//! use challenge_core::stores::memory::{MemoryChallengeStore, MemoryTaskStore};
//!
//! # async fn example() -> challenge_core::error::Result<()> {
//! let config = PipelineConfig::from_env()?;
//! let orchestrator = ChallengeBuildOrchestrator::new(
//!     config,
//!     Arc::new(MemoryChallengeStore::new()),
//!     Arc::new(MemoryTaskStore::new()),
//!     Arc::new(HttpFetcher::new()),
//!     Arc::new(TokioExecutor),
//! );
//! let outcome = orchestrator.rebuild_tasks(42, false).await?;
//! println!("rebuild request: {outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod formats;
pub mod geojson;
pub mod logging;
pub mod materializer;
pub mod models;
pub mod naming;
pub mod orchestration;
pub mod overpass;
pub mod rules;
pub mod stores;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use models::{BuildStatus, Challenge, CreationSource, OsmElementType, Task, TaskPriority};
pub use orchestration::{ChallengeBuildOrchestrator, RebuildOutcome};
