//! API routes for the lab server

pub mod knowledge_base;
pub mod query;
pub mod speech;
pub mod trace;

use axum::{
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Knowledge base question answering
        .route("/query", post(query::query_knowledge_base))
        // Document OCR to speech
        .route("/documents/speech", post(speech::process_document))
        .route("/speech/tasks/:task_id", get(speech::get_task))
        // Traced requests
        .route("/trace", post(trace::traced_request))
        // Knowledge base administration
        .route("/knowledge-bases", post(knowledge_base::create_knowledge_base))
        .route(
            "/knowledge-bases/:kb_id/data-sources",
            post(knowledge_base::add_data_source),
        )
        .route(
            "/knowledge-bases/:kb_id/data-sources/:ds_id/ingestion-jobs",
            post(knowledge_base::start_ingestion_job),
        )
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "cloud-labs",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Managed-service labs: knowledge base answers, document speech, traced requests",
        "endpoints": {
            "POST /api/query": "Answer a question from the knowledge base",
            "POST /api/documents/speech": "Extract a document's text and start speech synthesis",
            "GET /api/speech/tasks/:task_id": "Speech synthesis task status",
            "POST /api/trace": "Handle a traced request (database, file_processing, external_api, default)",
            "POST /api/knowledge-bases": "Create a knowledge base",
            "POST /api/knowledge-bases/:kb_id/data-sources": "Attach an S3 data source",
            "POST /api/knowledge-bases/:kb_id/data-sources/:ds_id/ingestion-jobs": "Start an ingestion job"
        }
    }))
}
