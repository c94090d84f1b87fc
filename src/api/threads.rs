use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::errors::error_response;
use crate::schemas::{
    DecisionRequest, DecisionResponse, QueryRequest, QueryResponse, ThreadStateResponse,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/query", post(submit_query))
        .route("/mutations/decision", post(apply_decision))
        .route("/threads/{thread_id}/state", get(thread_state))
}

/// Accept a natural-language query, run the workflow until it finishes
/// or suspends, and report the thread outcome.
async fn submit_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, Response> {
    let record = state
        .engine
        .run_query(&request.text)
        .await
        .map_err(|err| error_response(&err))?;
    Ok(Json(QueryResponse {
        thread_id: record.thread_id,
        status: record.status,
        result: record.result,
        summary: record.summary,
        interrupt_data: record.pending.map(|pending| vec![pending]),
        error_detail: record.error_detail,
    }))
}

/// Resolve a suspended mutation with approve, reject, or edit.
async fn apply_decision(
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, Response> {
    let outcome = state
        .engine
        .apply_decision(
            &request.thread_id,
            request.decision,
            request.modified_sql.as_deref(),
        )
        .await
        .map_err(|err| error_response(&err))?;
    Ok(Json(DecisionResponse {
        thread_id: outcome.record.thread_id,
        status: outcome.status,
        result: outcome.record.result,
        summary: outcome.record.summary,
        interrupt_data: outcome.record.pending.map(|pending| vec![pending]),
        error_detail: outcome.record.error_detail,
    }))
}

/// Full persisted state of one thread, for audit and polling clients.
async fn thread_state(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadStateResponse>, Response> {
    let record = state
        .engine
        .get_thread(&thread_id)
        .map_err(|err| error_response(&err))?;
    Ok(Json(ThreadStateResponse::from(record)))
}
