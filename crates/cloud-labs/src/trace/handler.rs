//! Traced request handler
//!
//! Dispatches on the event's `request_type` and records each step as a
//! subsegment of the request's trace.

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use super::context::TraceContext;
use super::emitter::SegmentEmitter;
use super::header::TraceHeader;
use crate::config::TraceConfig;
use crate::error::{Error, Result};
use crate::providers::item_table::item_to_json;
use crate::providers::{AttributeValue, Item, ItemTable, ObjectStore};

/// File types the file processing request accepts
pub const SUPPORTED_FORMATS: [&str; 3] = [".txt", ".json", ".csv"];

const PROCESSING_STEPS: [&str; 4] = ["validate", "transform", "enrich", "respond"];

/// Per-call context supplied by the caller
#[derive(Debug, Clone)]
pub struct Invocation {
    pub request_id: String,
    /// Incoming trace context; a new root trace is started when absent
    pub trace_header: Option<TraceHeader>,
}

/// Handler outcome
#[derive(Debug, Clone, PartialEq)]
pub struct TraceResponse {
    pub status_code: u16,
    pub trace_id: String,
    pub body: Value,
}

/// Traced request handler
pub struct TraceLabHandler {
    table: Arc<dyn ItemTable>,
    store: Arc<dyn ObjectStore>,
    emitter: Arc<dyn SegmentEmitter>,
    http: reqwest::Client,
    config: TraceConfig,
}

impl TraceLabHandler {
    pub fn new(
        table: Arc<dyn ItemTable>,
        store: Arc<dyn ObjectStore>,
        emitter: Arc<dyn SegmentEmitter>,
        http: reqwest::Client,
        config: TraceConfig,
    ) -> Self {
        Self {
            table,
            store,
            emitter,
            http,
            config,
        }
    }

    /// Handle one event and send its segment
    #[tracing::instrument(
        skip(self, event, invocation),
        fields(request_id = %invocation.request_id)
    )]
    pub async fn handle(&self, event: &Value, invocation: &Invocation) -> TraceResponse {
        let header = invocation
            .trace_header
            .clone()
            .unwrap_or_else(TraceHeader::new_root);
        let mut ctx = TraceContext::start(&self.config.function_name, &header);
        let trace_id = ctx.trace_id().to_string();

        let request_type = event
            .get("request_type")
            .and_then(Value::as_str)
            .unwrap_or("default")
            .to_string();

        ctx.put_annotation("function_name", self.config.function_name.as_str());
        ctx.put_annotation("request_id", invocation.request_id.as_str());
        ctx.put_annotation("request_type", request_type.as_str());
        ctx.put_metadata("event", event.clone());
        ctx.put_metadata(
            "runtime_info",
            json!({
                "received_at": Utc::now().to_rfc3339(),
                "trace_header": header.to_string(),
            }),
        );

        let outcome = match request_type.as_str() {
            "database" => self.handle_database_request(event, &mut ctx).await,
            "file_processing" => self.handle_file_processing(event, &mut ctx).await,
            "external_api" => self.handle_external_api_call(event, &mut ctx).await,
            _ => self.handle_default_request(event, &mut ctx),
        };

        let response = match outcome {
            Ok(result) => TraceResponse {
                status_code: 200,
                body: json!({
                    "message": "Request processed successfully",
                    "result": result,
                    "trace_id": trace_id,
                }),
                trace_id,
            },
            Err(e) => {
                tracing::error!("{} request failed: {}", request_type, e);
                ctx.record_failure(e.kind(), &e.to_string());
                TraceResponse {
                    status_code: 500,
                    body: json!({
                        "error": e.to_string(),
                        "trace_id": trace_id,
                    }),
                    trace_id,
                }
            }
        };

        self.emit(ctx).await;
        response
    }

    async fn emit(&self, ctx: TraceContext) {
        if !ctx.is_sampled() {
            return;
        }
        let segment = ctx.finish();
        if let Err(e) = self.emitter.emit(&segment).await {
            tracing::warn!("Failed to emit trace segment: {}", e);
        }
    }

    async fn handle_database_request(
        &self,
        event: &Value,
        ctx: &mut TraceContext,
    ) -> Result<Value> {
        ctx.begin_subsegment("database_operations");

        ctx.begin_subsegment("data_validation");
        let user_id = user_id_param(event)
            .ok_or_else(|| Error::invalid_request("Missing user_id parameter"))?;
        ctx.put_annotation("user_id", user_id.as_str());
        ctx.put_metadata(
            "validation_rules",
            json!({"user_id_required": true, "format": "string"}),
        );
        ctx.end_subsegment();

        let started = Instant::now();
        match self.upsert_user(&user_id).await {
            Ok(result) => {
                ctx.put_annotation("db_operation_duration", started.elapsed().as_secs_f64());
                ctx.end_subsegment();
                Ok(result)
            }
            Err(e) => {
                ctx.put_annotation("db_error", e.to_string());
                Err(e)
            }
        }
    }

    async fn upsert_user(&self, user_id: &str) -> Result<Value> {
        let table = &self.config.users_table;
        let key: Item = [("user_id".to_string(), AttributeValue::string(user_id))].into();
        let now = Utc::now().to_rfc3339();

        match self.table.get_item(table, key.clone()).await? {
            None => {
                let mut user = key;
                user.insert("created_at".to_string(), AttributeValue::string(now.clone()));
                user.insert("last_login".to_string(), AttributeValue::string(now));
                user.insert("login_count".to_string(), AttributeValue::number(1));
                self.table.put_item(table, user.clone()).await?;
                tracing::info!("Created user {}", user_id);
                Ok(json!({"action": "created", "user": item_to_json(&user)}))
            }
            Some(_) => {
                let values: Item = [
                    (":time".to_string(), AttributeValue::string(now)),
                    (":inc".to_string(), AttributeValue::number(1)),
                ]
                .into();
                self.table
                    .update_item(
                        table,
                        key,
                        "SET last_login = :time, login_count = login_count + :inc",
                        values,
                    )
                    .await?;
                tracing::info!("Updated user {}", user_id);
                Ok(json!({"action": "updated", "user_id": user_id}))
            }
        }
    }

    async fn handle_file_processing(&self, event: &Value, ctx: &mut TraceContext) -> Result<Value> {
        ctx.begin_subsegment("file_processing");

        let bucket = event
            .get("bucket")
            .and_then(Value::as_str)
            .unwrap_or(self.config.default_bucket.as_str());
        let file_key = event
            .get("file_key")
            .and_then(Value::as_str)
            .unwrap_or(self.config.default_file_key.as_str());
        ctx.put_annotation("bucket_name", bucket);
        ctx.put_annotation("file_key", file_key);

        ctx.begin_subsegment("file_validation");
        if !SUPPORTED_FORMATS.iter().any(|ext| file_key.ends_with(ext)) {
            return Err(Error::invalid_request(format!(
                "Unsupported file type: {}",
                file_key
            )));
        }
        ctx.put_metadata("supported_formats", json!(SUPPORTED_FORMATS));
        ctx.end_subsegment();

        let content = match self.read_text(bucket, file_key).await {
            Ok(content) => content,
            Err(e) => {
                ctx.put_annotation("file_processing_error", e.to_string());
                return Err(e);
            }
        };

        ctx.begin_subsegment("content_processing");
        let started = Instant::now();
        let stats = content_stats(&content);
        let processing_time = started.elapsed().as_secs_f64();
        ctx.put_annotation("lines_processed", stats.lines);
        ctx.put_annotation("word_count", stats.words);
        ctx.put_annotation("processing_time", processing_time);
        ctx.end_subsegment();

        ctx.end_subsegment();
        Ok(json!({
            "file_key": file_key,
            "lines": stats.lines,
            "words": stats.words,
            "processing_time": processing_time,
        }))
    }

    async fn read_text(&self, bucket: &str, key: &str) -> Result<String> {
        let bytes = self.store.get_object(bucket, key).await?;
        String::from_utf8(bytes)
            .map_err(|_| {
                Error::invalid_request(format!("s3://{}/{} is not valid UTF-8", bucket, key))
            })
    }

    async fn handle_external_api_call(
        &self,
        event: &Value,
        ctx: &mut TraceContext,
    ) -> Result<Value> {
        ctx.begin_subsegment("external_api_call");

        let endpoint = event
            .get("api_endpoint")
            .and_then(Value::as_str)
            .unwrap_or(self.config.default_api_endpoint.as_str());
        ctx.put_annotation("api_endpoint", endpoint);

        ctx.begin_subsegment("api_request");
        let started = Instant::now();
        match self.fetch(endpoint).await {
            Ok(data) => {
                let latency = started.elapsed().as_secs_f64();
                ctx.put_annotation("api_status", "success");
                ctx.put_annotation("api_latency", latency);
                ctx.end_subsegment();
                ctx.end_subsegment();
                Ok(json!({"status": "success", "data": data, "latency": latency}))
            }
            Err(e) => {
                ctx.put_annotation("api_status", "error");
                let detail = match e {
                    Error::ExternalApi(message) => message,
                    other => other.to_string(),
                };
                Err(Error::ExternalApi(format!(
                    "API call failed after {:.2}s: {}",
                    started.elapsed().as_secs_f64(),
                    detail
                )))
            }
        }
    }

    async fn fetch(&self, endpoint: &str) -> Result<Value> {
        let response = self.http.get(endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::ExternalApi(format!("{} returned {}", endpoint, status)));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }

    fn handle_default_request(&self, event: &Value, ctx: &mut TraceContext) -> Result<Value> {
        ctx.begin_subsegment("default_processing");
        ctx.begin_subsegment("business_logic");
        ctx.put_annotation("operation_type", "default");

        let mut timestamp = String::new();
        for step in PROCESSING_STEPS {
            ctx.begin_subsegment(&format!("step_{}", step));
            let started = Instant::now();
            match step {
                "validate" => ctx.put_metadata(
                    "event_fields",
                    json!(event.as_object().map_or(0, |o| o.len())),
                ),
                "transform" => ctx.put_metadata("event_size", json!(event.to_string().len())),
                "enrich" => timestamp = Utc::now().to_rfc3339(),
                _ => {}
            }
            ctx.put_annotation(&format!("{}_duration", step), started.elapsed().as_secs_f64());
            ctx.end_subsegment();
        }

        ctx.end_subsegment();
        ctx.end_subsegment();
        Ok(json!({
            "message": "Default processing completed",
            "steps_completed": PROCESSING_STEPS.len(),
            "timestamp": timestamp,
        }))
    }
}

/// `user_id` as a key string: non-empty strings as given, non-zero numbers
/// in their JSON form
fn user_id_param(event: &Value) -> Option<String> {
    match event.get("user_id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

/// Line and word counts of a text file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentStats {
    /// Pieces between `\n` separators (a trailing newline adds an empty line)
    pub lines: usize,
    /// Whitespace-separated words
    pub words: usize,
}

pub fn content_stats(content: &str) -> ContentStats {
    ContentStats {
        lines: content.split('\n').count(),
        words: content.split_whitespace().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::item_table::MockItemTable;
    use crate::providers::object_store::MockObjectStore;
    use crate::trace::segment::{AnnotationValue, Entity, Segment};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingEmitter {
        segments: Mutex<Vec<Segment>>,
    }

    #[async_trait]
    impl SegmentEmitter for RecordingEmitter {
        async fn emit(&self, segment: &Segment) -> Result<()> {
            self.segments.lock().unwrap().push(segment.clone());
            Ok(())
        }
    }

    impl RecordingEmitter {
        fn only(&self) -> Segment {
            let segments = self.segments.lock().unwrap();
            assert_eq!(segments.len(), 1);
            segments[0].clone()
        }
    }

    fn handler(
        table: MockItemTable,
        store: MockObjectStore,
        emitter: Arc<RecordingEmitter>,
    ) -> TraceLabHandler {
        TraceLabHandler::new(
            Arc::new(table),
            Arc::new(store),
            emitter,
            reqwest::Client::new(),
            TraceConfig::default(),
        )
    }

    fn invocation() -> Invocation {
        Invocation {
            request_id: "req-1".to_string(),
            trace_header: Some(
                "Root=1-5759e988-bd862e3fe1be46a994272793;Sampled=1".parse().unwrap(),
            ),
        }
    }

    fn find<'a>(entity: &'a Entity, name: &str) -> Option<&'a Entity> {
        if entity.name == name {
            return Some(entity);
        }
        entity.subsegments.iter().find_map(|s| find(s, name))
    }

    #[test]
    fn test_content_stats() {
        assert_eq!(
            content_stats("one two\nthree\n"),
            ContentStats { lines: 3, words: 3 }
        );
        assert_eq!(content_stats(""), ContentStats { lines: 1, words: 0 });
    }

    #[tokio::test]
    async fn test_default_request() {
        let emitter = Arc::new(RecordingEmitter::default());
        let response = handler(MockItemTable::new(), MockObjectStore::new(), emitter.clone())
            .handle(&json!({}), &invocation())
            .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.trace_id, "1-5759e988-bd862e3fe1be46a994272793");
        assert_eq!(response.body["message"], "Request processed successfully");
        assert_eq!(response.body["result"]["steps_completed"], 4);
        assert_eq!(response.body["trace_id"], response.trace_id);

        let segment = emitter.only();
        assert_eq!(
            segment.entity.annotations["request_type"],
            AnnotationValue::from("default")
        );
        assert_eq!(
            segment.entity.annotations["request_id"],
            AnnotationValue::from("req-1")
        );
        let business = find(&segment.entity, "business_logic").unwrap();
        let steps: Vec<&str> = business.subsegments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(steps, vec!["step_validate", "step_transform", "step_enrich", "step_respond"]);
        assert!(business.subsegments[2].annotations.contains_key("enrich_duration"));
    }

    #[tokio::test]
    async fn test_database_creates_missing_user() {
        let mut table = MockItemTable::new();
        table
            .expect_get_item()
            .withf(|table: &str, key: &Item| {
                table == "bike-users" && key["user_id"] == AttributeValue::string("u-7")
            })
            .times(1)
            .returning(|_, _| Ok(None));
        table
            .expect_put_item()
            .withf(|_, item: &Item| item["login_count"] == AttributeValue::number(1))
            .times(1)
            .returning(|_, _| Ok(()));

        let emitter = Arc::new(RecordingEmitter::default());
        let response = handler(table, MockObjectStore::new(), emitter.clone())
            .handle(&json!({"request_type": "database", "user_id": "u-7"}), &invocation())
            .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["result"]["action"], "created");
        assert_eq!(response.body["result"]["user"]["login_count"], 1);

        let segment = emitter.only();
        let db = find(&segment.entity, "database_operations").unwrap();
        assert!(db.annotations.contains_key("db_operation_duration"));
        assert!(find(&segment.entity, "data_validation").is_some());
    }

    #[tokio::test]
    async fn test_database_updates_existing_user() {
        let mut table = MockItemTable::new();
        table.expect_get_item().returning(|_, key| Ok(Some(key)));
        table
            .expect_update_item()
            .withf(|_, _, expression: &str, values: &Item| {
                expression == "SET last_login = :time, login_count = login_count + :inc"
                    && values[":inc"] == AttributeValue::number(1)
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let response = handler(table, MockObjectStore::new(), Arc::new(RecordingEmitter::default()))
            .handle(&json!({"request_type": "database", "user_id": "u-7"}), &invocation())
            .await;

        assert_eq!(response.body["result"]["action"], "updated");
        assert_eq!(response.body["result"]["user_id"], "u-7");
    }

    #[tokio::test]
    async fn test_database_requires_user_id() {
        let mut table = MockItemTable::new();
        table.expect_get_item().times(0);

        let emitter = Arc::new(RecordingEmitter::default());
        let response = handler(table, MockObjectStore::new(), emitter.clone())
            .handle(&json!({"request_type": "database"}), &invocation())
            .await;

        assert_eq!(response.status_code, 500);
        assert!(response.body["error"]
            .as_str()
            .unwrap()
            .contains("Missing user_id parameter"));
        assert_eq!(response.body["trace_id"], "1-5759e988-bd862e3fe1be46a994272793");

        let segment = emitter.only();
        assert!(segment.entity.fault);
        assert!(segment.entity.cause.is_some());
    }

    #[tokio::test]
    async fn test_database_numeric_user_id() {
        let mut table = MockItemTable::new();
        table
            .expect_get_item()
            .withf(|_, key: &Item| key["user_id"] == AttributeValue::string("42"))
            .times(1)
            .returning(|_, key| Ok(Some(key)));
        table.expect_update_item().times(1).returning(|_, _, _, _| Ok(()));

        let response = handler(table, MockObjectStore::new(), Arc::new(RecordingEmitter::default()))
            .handle(&json!({"request_type": "database", "user_id": 42}), &invocation())
            .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["result"]["user_id"], "42");
    }

    #[test]
    fn test_user_id_param() {
        assert_eq!(user_id_param(&json!({"user_id": "u-7"})).as_deref(), Some("u-7"));
        assert_eq!(user_id_param(&json!({"user_id": 42})).as_deref(), Some("42"));
        assert_eq!(user_id_param(&json!({"user_id": 1.5})).as_deref(), Some("1.5"));
        assert_eq!(user_id_param(&json!({"user_id": ""})), None);
        assert_eq!(user_id_param(&json!({"user_id": 0})), None);
        assert_eq!(user_id_param(&json!({"user_id": true})), None);
        assert_eq!(user_id_param(&json!({"user_id": null})), None);
        assert_eq!(user_id_param(&json!({})), None);
    }

    #[tokio::test]
    async fn test_database_error_annotated() {
        let mut table = MockItemTable::new();
        table
            .expect_get_item()
            .returning(|_, _| Err(Error::Database("ResourceNotFoundException".into())));

        let emitter = Arc::new(RecordingEmitter::default());
        let response = handler(table, MockObjectStore::new(), emitter.clone())
            .handle(&json!({"request_type": "database", "user_id": "u-1"}), &invocation())
            .await;

        assert_eq!(response.status_code, 500);
        let segment = emitter.only();
        let db = find(&segment.entity, "database_operations").unwrap();
        assert!(db.annotations.contains_key("db_error"));
    }

    #[tokio::test]
    async fn test_file_processing_counts() {
        let mut store = MockObjectStore::new();
        store
            .expect_get_object()
            .withf(|bucket: &str, key: &str| bucket == "bike-app-files" && key == "rides.csv")
            .times(1)
            .returning(|_, _| Ok(b"id,miles\n1,12\n2,7".to_vec()));

        let emitter = Arc::new(RecordingEmitter::default());
        let response = handler(MockItemTable::new(), store, emitter.clone())
            .handle(
                &json!({"request_type": "file_processing", "file_key": "rides.csv"}),
                &invocation(),
            )
            .await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["result"]["lines"], 3);
        assert_eq!(response.body["result"]["words"], 3);

        let segment = emitter.only();
        let processing = find(&segment.entity, "content_processing").unwrap();
        assert_eq!(processing.annotations["lines_processed"], AnnotationValue::Number(3.0));
    }

    #[tokio::test]
    async fn test_file_processing_rejects_extension() {
        let mut store = MockObjectStore::new();
        store.expect_get_object().times(0);

        let response = handler(MockItemTable::new(), store, Arc::new(RecordingEmitter::default()))
            .handle(
                &json!({"request_type": "file_processing", "file_key": "photo.png"}),
                &invocation(),
            )
            .await;

        assert_eq!(response.status_code, 500);
        assert!(response.body["error"]
            .as_str()
            .unwrap()
            .contains("Unsupported file type: photo.png"));
    }

    async fn serve_api() -> String {
        use axum::{http::StatusCode, routing::get, Json, Router};

        let app = Router::new()
            .route("/data", get(|| async { Json(json!({"temperature": 22, "humidity": 45})) }))
            .route("/plain", get(|| async { "pong" }))
            .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", address)
    }

    #[tokio::test]
    async fn test_external_api_success() {
        let base = serve_api().await;
        let emitter = Arc::new(RecordingEmitter::default());
        let handler = handler(MockItemTable::new(), MockObjectStore::new(), emitter.clone());

        let response = handler
            .handle(
                &json!({"request_type": "external_api", "api_endpoint": format!("{}/data", base)}),
                &invocation(),
            )
            .await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["result"]["status"], "success");
        assert_eq!(response.body["result"]["data"]["temperature"], 22);

        let segment = emitter.only();
        let request = find(&segment.entity, "api_request").unwrap();
        assert_eq!(request.annotations["api_status"], AnnotationValue::from("success"));
        assert!(request.annotations.contains_key("api_latency"));

        let response = handler
            .handle(
                &json!({"request_type": "external_api", "api_endpoint": format!("{}/plain", base)}),
                &invocation(),
            )
            .await;
        assert_eq!(response.body["result"]["data"], "pong");
    }

    #[tokio::test]
    async fn test_external_api_failure() {
        let base = serve_api().await;
        let emitter = Arc::new(RecordingEmitter::default());
        let response = handler(MockItemTable::new(), MockObjectStore::new(), emitter.clone())
            .handle(
                &json!({"request_type": "external_api", "api_endpoint": format!("{}/down", base)}),
                &invocation(),
            )
            .await;

        assert_eq!(response.status_code, 500);
        assert!(response.body["error"].as_str().unwrap().contains("503"));

        let segment = emitter.only();
        let request = find(&segment.entity, "api_request").unwrap();
        assert_eq!(request.annotations["api_status"], AnnotationValue::from("error"));
        assert!(request.fault);
    }

    #[tokio::test]
    async fn test_unsampled_trace_not_emitted() {
        let emitter = Arc::new(RecordingEmitter::default());
        let invocation = Invocation {
            request_id: "req-2".to_string(),
            trace_header: Some(
                "Root=1-5759e988-bd862e3fe1be46a994272793;Sampled=0".parse().unwrap(),
            ),
        };
        let response = handler(MockItemTable::new(), MockObjectStore::new(), emitter.clone())
            .handle(&json!({}), &invocation)
            .await;

        assert_eq!(response.status_code, 200);
        assert!(emitter.segments.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parent_makes_independent_subsegment() {
        let emitter = Arc::new(RecordingEmitter::default());
        let invocation = Invocation {
            request_id: "req-3".to_string(),
            trace_header: Some(
                "Root=1-5759e988-bd862e3fe1be46a994272793;Parent=53995c3f42cd8ad8;Sampled=1"
                    .parse()
                    .unwrap(),
            ),
        };
        handler(MockItemTable::new(), MockObjectStore::new(), emitter.clone())
            .handle(&json!({}), &invocation)
            .await;

        let segment = emitter.only();
        assert_eq!(segment.parent_id.as_deref(), Some("53995c3f42cd8ad8"));
        assert_eq!(segment.segment_type.as_deref(), Some("subsegment"));
    }
}
