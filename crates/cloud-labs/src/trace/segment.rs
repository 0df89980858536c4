//! Segment documents
//!
//! Serialized in the daemon's JSON format; empty collections and unset
//! optional fields are left out.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::header::{new_entity_id, TraceId};

/// Namespace used by `put_metadata`
pub const DEFAULT_NAMESPACE: &str = "default";

/// Indexed annotation value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnnotationValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl From<&str> for AnnotationValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AnnotationValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for AnnotationValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<usize> for AnnotationValue {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<bool> for AnnotationValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Annotation keys may only hold ASCII letters, digits and underscores
pub fn is_valid_annotation_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Recorded exception
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceException {
    pub id: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Error cause attached to a failed entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cause {
    pub exceptions: Vec<TraceException>,
}

/// Fields shared by segments and subsegments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub start_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, AnnotationValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fault: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<Cause>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsegments: Vec<Entity>,
}

impl Entity {
    /// Open an entity starting now
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            name: name.into(),
            start_time: epoch_seconds(),
            end_time: None,
            annotations: BTreeMap::new(),
            metadata: BTreeMap::new(),
            error: false,
            fault: false,
            cause: None,
            subsegments: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Stamp the end time unless already closed
    pub fn close(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(epoch_seconds());
        }
    }

    /// Add an annotation; keys with characters outside `[A-Za-z0-9_]` are dropped
    pub fn put_annotation(&mut self, key: &str, value: impl Into<AnnotationValue>) {
        if !is_valid_annotation_key(key) {
            tracing::warn!("Ignoring annotation with invalid key: {}", key);
            return;
        }
        self.annotations.insert(key.to_string(), value.into());
    }

    /// Add metadata under the `default` namespace
    pub fn put_metadata(&mut self, key: &str, value: serde_json::Value) {
        self.metadata
            .entry(DEFAULT_NAMESPACE.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Record a failure: sets the fault flag and appends to the cause
    pub fn add_exception(&mut self, kind: &str, message: &str) {
        self.fault = true;
        self.cause
            .get_or_insert_with(Cause::default)
            .exceptions
            .push(TraceException {
                id: new_entity_id(),
                message: message.to_string(),
                kind: kind.to_string(),
            });
    }
}

/// Top-level document for one request
///
/// With a parent id it is sent as an independent subsegment of the
/// caller's segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub trace_id: TraceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub segment_type: Option<String>,
    #[serde(flatten)]
    pub entity: Entity,
}

impl Segment {
    pub fn new(name: impl Into<String>, trace_id: TraceId, parent_id: Option<String>) -> Self {
        let segment_type = parent_id.as_ref().map(|_| "subsegment".to_string());
        Self {
            trace_id,
            parent_id,
            segment_type,
            entity: Entity::open(name),
        }
    }

    pub fn id(&self) -> &str {
        &self.entity.id
    }
}

/// Seconds since the Unix epoch with microsecond precision
pub fn epoch_seconds() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_key_rules() {
        assert!(is_valid_annotation_key("db_operation_duration"));
        assert!(is_valid_annotation_key("Step2"));
        assert!(!is_valid_annotation_key("api-status"));
        assert!(!is_valid_annotation_key("file.key"));
        assert!(!is_valid_annotation_key(""));
    }

    #[test]
    fn test_invalid_annotation_dropped() {
        let mut entity = Entity::open("handler");
        entity.put_annotation("ok_key", "v");
        entity.put_annotation("bad key", "v");
        assert_eq!(entity.annotations.len(), 1);
        assert_eq!(entity.annotations["ok_key"], AnnotationValue::from("v"));
    }

    #[test]
    fn test_exception_sets_fault_and_cause() {
        let mut entity = Entity::open("handler");
        entity.add_exception("ValueError", "Missing user_id parameter");
        assert!(entity.fault);
        let cause = entity.cause.unwrap();
        assert_eq!(cause.exceptions[0].message, "Missing user_id parameter");
        assert_eq!(cause.exceptions[0].kind, "ValueError");
    }

    #[test]
    fn test_segment_document_shape() {
        let trace_id: TraceId = "1-5759e988-bd862e3fe1be46a994272793".parse().unwrap();
        let mut segment = Segment::new("cloud-labs", trace_id, None);
        segment.entity.put_annotation("request_type", "database");
        segment.entity.put_annotation("login_count", 3usize);
        segment.entity.put_metadata("event", serde_json::json!({"user_id": "u-1"}));
        segment.entity.close();

        let doc = serde_json::to_value(&segment).unwrap();
        assert_eq!(doc["trace_id"], "1-5759e988-bd862e3fe1be46a994272793");
        assert_eq!(doc["name"], "cloud-labs");
        assert_eq!(doc["id"].as_str().unwrap().len(), 16);
        assert_eq!(doc["annotations"]["request_type"], "database");
        assert_eq!(doc["annotations"]["login_count"], 3.0);
        assert_eq!(doc["metadata"]["default"]["event"]["user_id"], "u-1");
        assert!(doc.get("type").is_none());
        assert!(doc.get("parent_id").is_none());
        assert!(doc.get("fault").is_none());
        assert!(doc["end_time"].as_f64().unwrap() >= doc["start_time"].as_f64().unwrap());
    }

    #[test]
    fn test_segment_with_parent_is_subsegment() {
        let segment = Segment::new(
            "cloud-labs",
            TraceId::generate(),
            Some("53995c3f42cd8ad8".into()),
        );
        let doc = serde_json::to_value(&segment).unwrap();
        assert_eq!(doc["type"], "subsegment");
        assert_eq!(doc["parent_id"], "53995c3f42cd8ad8");
        assert!(doc.get("end_time").is_none());
    }
}
