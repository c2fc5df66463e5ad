//! Orchestration: run a batch of markets through build → score → select.

pub mod pipeline;
pub mod report;

pub use pipeline::{run_pipeline, Pipeline, PipelineOutput};
pub use report::{ErrorReport, FailureKind, ItemFailure};
