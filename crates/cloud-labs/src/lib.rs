//! cloud-labs: managed-service lab handlers behind one HTTP server
//!
//! - Knowledge base question answering (retrieve, filter, build context, generate)
//! - Document OCR to speech synthesis
//! - Request handling traced as segments and subsegments
//!
//! Every external service is reached through a capability trait in
//! [`providers`], with signed AWS REST clients in [`providers::aws`].

pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod speech;
pub mod trace;
pub mod types;

pub use config::LabConfig;
pub use error::{Error, Result};
pub use pipeline::{PipelineRun, PipelineState, RagPipeline};
pub use types::{Query, QueryRequest, QueryResult, RetrievedChunk};
