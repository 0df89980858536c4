//! Request tracing lab
//!
//! Records a segment per request with nested subsegments, annotations and
//! metadata, and sends it to the trace daemon over UDP.

pub mod context;
pub mod emitter;
pub mod handler;
pub mod header;
pub mod segment;

pub use context::TraceContext;
pub use emitter::{NoopEmitter, SegmentEmitter, UdpEmitter};
pub use handler::{Invocation, TraceLabHandler, TraceResponse};
pub use header::{TraceHeader, TraceId};
pub use segment::{AnnotationValue, Entity, Segment};
