//! # Structured Error Handling
//!
//! Crate-wide error type covering the ingestion pipeline's failure taxonomy.
//!
//! Terminal failures (transport, capacity, structural parse) bubble up to the
//! orchestrator and end the build in a `Failed` status. Per-item failures
//! (geometry extraction, a single malformed line) are caught at the unit of
//! work and only degrade the final status to `PartiallyLoaded`. Rule
//! evaluation errors belong to the priority recomputation stage and never
//! touch the build status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid or missing configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Materializing the batch would exceed the per-challenge task cap
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// Network failure, non-success status, or unusable content type
    #[error("Transport error: {0}")]
    Transport(String),

    /// Top-level payload could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// A candidate element or feature yielded no usable geometry
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// A priority rule could not be evaluated against a task
    #[error("Rule evaluation error: {0}")]
    RuleEvaluation(String),

    /// The external task or challenge store reported a failure
    #[error("Store error: {0}")]
    Store(String),

    /// A concurrent upsert created the task first; callers treat this as
    /// already handled rather than as a failure
    #[error("Uniqueness violation: {0}")]
    UniquenessViolation(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(error: serde_json::Error) -> Self {
        PipelineError::Parse(error.to_string())
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            PipelineError::Transport(format!("request timed out: {error}"))
        } else {
            PipelineError::Transport(error.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
