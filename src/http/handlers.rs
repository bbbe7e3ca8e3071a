//! Circuit endpoints.
//!
//! Mutating endpoints answer 202: the operation is applied and persisted
//! before the response, but any remediation it starts runs afterwards.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::breaker::{ActorOperation, FailureSignal, OperationReport};
use crate::http::response::ApiError;
use crate::http::server::AppState;

type Accepted = (StatusCode, Json<OperationReport>);

pub async fn add_failure(
    State(state): State<AppState>,
    Path(key): Path<String>,
    body: Bytes,
) -> Result<Accepted, ApiError> {
    let signal = FailureSignal::from_json(&body)?;
    tracing::debug!(circuit = %key, request_id = %signal.request_id, "Failure reported");

    let report = state.directory.dispatch(&key, ActorOperation::AddFailure(signal)).await?;
    Ok((StatusCode::ACCEPTED, Json(report)))
}

pub async fn open_circuit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Accepted, ApiError> {
    let report = state.directory.dispatch(&key, ActorOperation::Open).await?;
    Ok((StatusCode::ACCEPTED, Json(report)))
}

pub async fn close_circuit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Accepted, ApiError> {
    let report = state.directory.dispatch(&key, ActorOperation::Close).await?;
    Ok((StatusCode::ACCEPTED, Json(report)))
}

pub async fn get_circuit(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<OperationReport>, ApiError> {
    let report = state.directory.dispatch(&key, ActorOperation::Inspect).await?;
    Ok(Json(report))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
