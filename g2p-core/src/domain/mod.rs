//! Core domain types
//!
//! The pipeline graph is built once from a descriptor and then filled in
//! place while the orchestrator advances. Every state and checker keeps its
//! mutable fields behind its own lock: the orchestrator is the only writer,
//! the reporter reads consistent per-entity snapshots.

pub mod lifecycle;
pub mod pipeline;
pub mod snapshot;

pub use lifecycle::{Lifecycle, LifecyclePhase, Severity, Tracked, format_elapsed};
pub use pipeline::{Checker, CheckerProgress, Pipeline, State};
pub use snapshot::{CheckerSnapshot, PipelineSnapshot, StateSnapshot};
