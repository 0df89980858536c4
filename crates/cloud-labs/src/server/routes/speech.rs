//! Document speech endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::Result;
use crate::providers::SynthesisTask;
use crate::server::extract::ApiJson;
use crate::server::state::AppState;
use crate::speech::{HandlerResponse, SpeechEvent};

/// POST /api/documents/speech - Extract text from a document and start synthesis
pub async fn process_document(
    State(state): State<AppState>,
    ApiJson(event): ApiJson<SpeechEvent>,
) -> (StatusCode, Json<HandlerResponse>) {
    let request_id = Uuid::new_v4().to_string();
    let response = state.speech().handle(&event, &request_id).await;
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (status, Json(response))
}

/// GET /api/speech/tasks/:task_id - Synthesis task status
pub async fn get_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<SynthesisTask>> {
    let task = state.speech().task_status(&task_id).await?;
    Ok(Json(task))
}
