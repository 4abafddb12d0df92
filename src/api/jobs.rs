// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider-style submission: the requester first stores the encoded intent
//! in secret slot #1, then asks for a job that reads it.
//!
//! Slots are immutable, so a resubmission runs whatever intent the slot
//! already holds.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use super::intents::{accepting_executor, start};
use crate::{
    error::ApiError,
    intent::{decode, parse_account, IntentPayload, INTENT_SECRET_INDEX},
    models::{ProcessIntentResponse, PushSecretRequest, SubmitJobRequest},
    secrets::SecretError,
    state::AppState,
};

#[utoipa::path(
    put,
    path = "/secrets/{requester}/{index}",
    request_body = PushSecretRequest,
    params(
        ("requester" = String, Path, description = "Requester address"),
        ("index" = u32, Path, description = "Secret slot")
    ),
    tag = "Jobs",
    responses(
        (status = 201, description = "Secret stored"),
        (status = 400, description = "Invalid requester or value"),
        (status = 409, description = "Slot already holds a secret")
    )
)]
pub async fn push_secret(
    Path((requester, index)): Path<(String, u32)>,
    State(state): State<AppState>,
    Json(request): Json<PushSecretRequest>,
) -> Result<StatusCode, ApiError> {
    let requester = parse_account("requester", &requester)?;

    match state.secrets.push(requester, index, request.value).await {
        Ok(()) => {
            info!(%requester, index, "Requester secret stored");
            Ok(StatusCode::CREATED)
        }
        Err(e @ SecretError::AlreadyExists { .. }) => Err(ApiError::conflict(e.to_string())),
        Err(e @ SecretError::TooLarge) => Err(ApiError::bad_request(e.to_string())),
    }
}

#[utoipa::path(
    post,
    path = "/jobs",
    request_body = SubmitJobRequest,
    tag = "Jobs",
    responses(
        (status = 202, description = "Execution started", body = ProcessIntentResponse),
        (status = 400, description = "Stored intent is invalid"),
        (status = 404, description = "No intent secret for this requester"),
        (status = 503, description = "Execution unavailable")
    )
)]
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<(StatusCode, Json<ProcessIntentResponse>), ApiError> {
    let executor = accepting_executor(&state)?;
    let requester = parse_account("requester", &request.requester)?;

    let secret = state
        .secrets
        .get(requester, INTENT_SECRET_INDEX)
        .await
        .ok_or_else(|| ApiError::not_found("No intent secret for this requester"))?;
    let intent = decode(&IntentPayload::from_secret(secret))?;

    info!(
        app = %request.app,
        workerpool = request.workerpool.as_deref().unwrap_or("default"),
        "Job requested"
    );
    Ok(start(&state, executor, intent).await)
}
