//! Per-request trace recorder

use super::header::{TraceHeader, TraceId};
use super::segment::{AnnotationValue, Entity, Segment};

/// Records one request's segment and its nested subsegments
///
/// Annotation, metadata and exception calls apply to the innermost open
/// subsegment, or to the segment when none is open.
#[derive(Debug)]
pub struct TraceContext {
    segment: Segment,
    open: Vec<Entity>,
    sampled: bool,
}

impl TraceContext {
    /// Start a segment continuing `header`'s trace
    pub fn start(name: &str, header: &TraceHeader) -> Self {
        Self {
            segment: Segment::new(name, header.root.clone(), header.parent.clone()),
            open: Vec::new(),
            sampled: header.is_sampled(),
        }
    }

    pub fn trace_id(&self) -> &TraceId {
        &self.segment.trace_id
    }

    pub fn segment_id(&self) -> &str {
        self.segment.id()
    }

    pub fn is_sampled(&self) -> bool {
        self.sampled
    }

    /// Number of currently open subsegments
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    fn current(&mut self) -> &mut Entity {
        match self.open.last_mut() {
            Some(entity) => entity,
            None => &mut self.segment.entity,
        }
    }

    /// Open a subsegment nested in the current entity
    pub fn begin_subsegment(&mut self, name: &str) {
        self.open.push(Entity::open(name));
    }

    /// Close the innermost subsegment and attach it to its parent
    pub fn end_subsegment(&mut self) {
        match self.open.pop() {
            Some(mut entity) => {
                entity.close();
                self.current().subsegments.push(entity);
            }
            None => tracing::warn!("end_subsegment called with no open subsegment"),
        }
    }

    pub fn put_annotation(&mut self, key: &str, value: impl Into<AnnotationValue>) {
        self.current().put_annotation(key, value);
    }

    pub fn put_metadata(&mut self, key: &str, value: serde_json::Value) {
        self.current().put_metadata(key, value);
    }

    pub fn add_exception(&mut self, kind: &str, message: &str) {
        self.current().add_exception(kind, message);
    }

    /// Record a failure on every open entity, innermost first, and on the segment
    pub fn record_failure(&mut self, kind: &str, message: &str) {
        for entity in self.open.iter_mut().rev() {
            entity.add_exception(kind, message);
        }
        self.segment.entity.add_exception(kind, message);
    }

    /// Close everything still open and return the finished document
    pub fn finish(mut self) -> Segment {
        while !self.open.is_empty() {
            self.end_subsegment();
        }
        self.segment.entity.close();
        self.segment
    }
}
