//! Traced request endpoint

use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::server::extract::ApiJson;
use crate::server::state::AppState;
use crate::trace::header::TRACE_HTTP_HEADER;
use crate::trace::{Invocation, TraceHeader};

/// POST /api/trace - Handle a request inside a trace segment
///
/// Continues the trace named by an incoming `X-Amzn-Trace-Id` header, or by the
/// Lambda runtime trace variable when running as a function.
pub async fn traced_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(event): ApiJson<serde_json::Value>,
) -> Response {
    let trace_header = headers
        .get(TRACE_HTTP_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| match v.parse::<TraceHeader>() {
            Ok(header) => Some(header),
            Err(e) => {
                tracing::warn!("Ignoring trace header: {}", e);
                None
            }
        })
        .or_else(TraceHeader::from_env);

    let invocation = Invocation {
        request_id: Uuid::new_v4().to_string(),
        trace_header,
    };
    let response = state.trace().handle(&event, &invocation).await;

    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut http = (status, Json(response.body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&response.trace_id) {
        http.headers_mut().insert("x-trace-id", value);
    }
    http
}
