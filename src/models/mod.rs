//! # Data Models
//!
//! Challenge and task models shared across the ingestion pipeline. The
//! relational schema behind these types is owned by the external stores;
//! this crate only carries the fields the pipeline reads and writes.

pub mod challenge;
pub mod task;

pub use challenge::{BuildStatus, Challenge, CreationSource, OsmElementType};
pub use task::{Point, Task, TaskPriority};
