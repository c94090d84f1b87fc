use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use uuid::Uuid;

use crate::engine::EngineError;

pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        "INVALID_STATE" => StatusCode::CONFLICT,
        "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
        "GENERATION_FAILED" | "EXECUTION_FAILED" => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Render a workflow error as the unified envelope. Every error reply
/// carries `x-trace-id` and `x-error-code` for log correlation.
pub fn error_response(err: &EngineError) -> Response {
    let status = status_for_code(err.code());
    let trace_id = Uuid::new_v4().to_string();
    let body = json!({
        "error": {
            "code": err.code(),
            "message": err.message(),
            "status": status.as_u16(),
            "detail": err.detail(),
            "trace_id": trace_id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }
    });
    let mut response = (status, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("x-trace-id", value);
    }
    if let Ok(value) = HeaderValue::from_str(err.code()) {
        response.headers_mut().insert("x-error-code", value);
    }
    response
}
