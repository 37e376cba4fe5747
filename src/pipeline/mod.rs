// Enrichment pipeline: per-row processing and the run orchestrator.

pub mod orchestrator;
pub mod processing;

pub use orchestrator::{PipelineMetrics, PipelineOrchestrator, PipelineReport};
