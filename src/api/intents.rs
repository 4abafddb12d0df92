// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fallback execution endpoints.
//!
//! `POST /process-intent` validates the request, starts the pipeline in the
//! background and returns the execution id right away. `GET /status/{id}`
//! reports progress and, once terminal, the proof or failure record.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::{
    blockchain::UsdcAmount,
    error::ApiError,
    executions::launch,
    intent::{parse_account, Intent, IntentError},
    pipeline::IntentExecutor,
    models::{
        ExecutionStatusKind, ExecutionStatusResponse, ProcessIntentRequest, ProcessIntentResponse,
    },
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/process-intent",
    request_body = ProcessIntentRequest,
    tag = "Executions",
    responses(
        (status = 202, description = "Execution started", body = ProcessIntentResponse),
        (status = 400, description = "Invalid intent"),
        (status = 503, description = "Execution unavailable")
    )
)]
pub async fn process_intent(
    State(state): State<AppState>,
    Json(request): Json<ProcessIntentRequest>,
) -> Result<(StatusCode, Json<ProcessIntentResponse>), ApiError> {
    let executor = accepting_executor(&state)?;

    let destination = parse_account("destination", &request.destination)?;
    let amount = UsdcAmount::parse(&request.amount.to_string()).map_err(IntentError::from)?;
    let vault = match request.vault_address.as_deref() {
        Some(vault) => parse_account("vaultAddress", vault)?,
        None => state
            .default_vault
            .ok_or_else(|| ApiError::bad_request("vaultAddress is required"))?,
    };
    let intent = Intent::from_parts(destination, amount, vault)?;

    Ok(start(&state, executor, intent).await)
}

/// The executor, if the server is configured and not shutting down.
pub(crate) fn accepting_executor(state: &AppState) -> Result<Arc<dyn IntentExecutor>, ApiError> {
    if state.shutdown.is_cancelled() {
        return Err(ApiError::service_unavailable("Server is shutting down"));
    }
    state
        .executor
        .clone()
        .ok_or_else(|| ApiError::service_unavailable("Execution is not configured"))
}

/// Launch a validated intent and build the `202 Accepted` reply.
pub(crate) async fn start(
    state: &AppState,
    executor: Arc<dyn IntentExecutor>,
    intent: Intent,
) -> (StatusCode, Json<ProcessIntentResponse>) {
    let execution_id = launch(
        &state.executions,
        &state.tasks,
        executor,
        intent,
        &state.shutdown,
    )
    .await;

    info!(execution_id = %execution_id, "Intent accepted");

    (
        StatusCode::ACCEPTED,
        Json(ProcessIntentResponse {
            execution_id,
            status: ExecutionStatusKind::Pending,
        }),
    )
}

#[utoipa::path(
    get,
    path = "/status/{execution_id}",
    params(
        ("execution_id" = String, Path, description = "Identifier returned by /process-intent")
    ),
    tag = "Executions",
    responses(
        (status = 200, body = ExecutionStatusResponse),
        (status = 404, description = "Unknown execution")
    )
)]
pub async fn execution_status(
    Path(execution_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ExecutionStatusResponse>, ApiError> {
    let record = state
        .executions
        .get(&execution_id)
        .await
        .ok_or_else(|| ApiError::not_found("Execution not found"))?;

    Ok(Json(record.to_response()))
}
