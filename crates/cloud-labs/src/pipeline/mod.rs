//! Knowledge base question answering pipeline
//!
//! Retrieve → filter by confidence → build context → generate, with an early
//! exit to the fallback answer when nothing clears the threshold.

pub mod orchestrator;
pub mod state;

pub use orchestrator::RagPipeline;
pub use state::{PipelineRun, PipelineState};
