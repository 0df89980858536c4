//! Knowledge base query endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::server::extract::ApiJson;
use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResult};

/// POST /api/query - Answer a question from the knowledge base
pub async fn query_knowledge_base(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<QueryRequest>,
) -> Result<Json<QueryResult>> {
    tracing::info!("Query: \"{}\"", request.question);

    let pipeline = state.pipeline()?;
    let query = request.into_query(&state.config().rag);
    let result = pipeline.run(&query).await?;

    Ok(Json(result))
}
