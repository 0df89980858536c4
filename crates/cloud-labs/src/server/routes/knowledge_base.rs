//! Knowledge base administration endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::error::Result;
use crate::providers::aws::{NewDataSource, NewKnowledgeBase};
use crate::server::extract::ApiJson;
use crate::server::state::AppState;

/// POST /api/knowledge-bases - Create a vector knowledge base
pub async fn create_knowledge_base(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewKnowledgeBase>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = state
        .knowledge_bases()?
        .create_knowledge_base(&request)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "knowledge_base_id": id }))))
}

/// POST /api/knowledge-bases/:kb_id/data-sources - Attach an S3 data source
pub async fn add_data_source(
    State(state): State<AppState>,
    Path(kb_id): Path<String>,
    ApiJson(request): ApiJson<NewDataSource>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = state
        .knowledge_bases()?
        .add_data_source(&kb_id, &request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "knowledge_base_id": kb_id, "data_source_id": id })),
    ))
}

/// POST /api/knowledge-bases/:kb_id/data-sources/:ds_id/ingestion-jobs - Start syncing
pub async fn start_ingestion_job(
    State(state): State<AppState>,
    Path((kb_id, ds_id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Value>)> {
    let id = state
        .knowledge_bases()?
        .start_ingestion_job(&kb_id, &ds_id)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "knowledge_base_id": kb_id,
            "data_source_id": ds_id,
            "ingestion_job_id": id
        })),
    ))
}
