// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the fallback execution server.
//!
//! The fallback server runs the same pipeline outside an enclave. This client
//! lets the rest of the crate treat it like any other job provider: it
//! stores requester secrets, submits jobs and reports job status in provider
//! terms.

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use super::{
    ComputeTarget, EnclaveJobs, ExecutionHandle, JobStatus, JobStatusSource, ProviderError,
    SecretStore,
};
use crate::error::excerpt;
use crate::intent::{decode, Intent, IntentPayload};
use crate::models::{
    ExecutionStatusKind, ExecutionStatusResponse, ProcessIntentResponse, PushSecretRequest,
    SubmitJobRequest,
};

/// Default fallback base URL.
pub const DEFAULT_FALLBACK_URL: &str = "http://localhost:8080";

/// Client for the fallback server's job and status endpoints.
#[derive(Clone)]
pub struct FallbackClient {
    http: Client,
    base_url: Url,
    requester: Option<Address>,
}

impl FallbackClient {
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        let base_url: Url = base_url
            .parse()
            .map_err(|e| ProviderError::Transport(format!("invalid base URL {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Transport(format!(
                "{base_url} cannot be a base URL"
            )));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            requester: None,
        })
    }

    /// Act for `requester`: secrets go to its slots, jobs read them.
    pub fn with_requester(mut self, requester: Address) -> Self {
        self.requester = Some(requester);
        self
    }

    /// Base URL joined with percent-encoded path segments.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn requester(&self) -> Result<Address, ProviderError> {
        self.requester
            .ok_or_else(|| ProviderError::Rejected("no requester configured".to_string()))
    }

    /// Submit an intent in the clear, without a secret slot.
    pub async fn process_intent(&self, intent: &Intent) -> Result<ExecutionHandle, ProviderError> {
        let body = serde_json::json!({
            "destination": intent.destination().to_checksum(None),
            "amount": intent.amount().to_string(),
            "vaultAddress": intent.vault().to_checksum(None),
        });

        let response = self
            .http
            .post(self.url(&["process-intent"]))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("POST /process-intent failed: {e}")))?;

        accepted(response).await
    }

    /// Start a job over the requester's stored intent.
    pub async fn submit_job(
        &self,
        target: &ComputeTarget,
    ) -> Result<ExecutionHandle, ProviderError> {
        let body = SubmitJobRequest {
            requester: self.requester()?.to_checksum(None),
            app: target.app.clone(),
            workerpool: target.workerpool.clone(),
        };

        let response = self
            .http
            .post(self.url(&["jobs"]))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("POST /jobs failed: {e}")))?;

        accepted(response).await
    }

    /// Full status of one execution.
    pub async fn execution_status(
        &self,
        handle: &ExecutionHandle,
    ) -> Result<ExecutionStatusResponse, ProviderError> {
        let response = self
            .http
            .get(self.url(&["status", handle.as_str()]))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("GET /status failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(handle.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &text));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("invalid status body: {e}")))
    }
}

/// Read the execution id out of a `202 Accepted` submission reply.
async fn accepted(response: reqwest::Response) -> Result<ExecutionHandle, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(error_for_status(status, &text));
    }

    let accepted: ProcessIntentResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("invalid submission body: {e}")))?;

    debug!(execution_id = %accepted.execution_id, "Fallback accepted submission");
    Ok(ExecutionHandle::new(accepted.execution_id))
}

/// Client errors are rejections; everything else is worth retrying.
fn error_for_status(status: StatusCode, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    if status.is_client_error() {
        ProviderError::Rejected(excerpt(&format!("{status}: {detail}")))
    } else {
        ProviderError::Transport(excerpt(&format!("{status}: {detail}")))
    }
}

impl From<ExecutionStatusKind> for JobStatus {
    fn from(kind: ExecutionStatusKind) -> Self {
        match kind {
            ExecutionStatusKind::Pending => JobStatus::Unset,
            ExecutionStatusKind::Processing => JobStatus::Active,
            ExecutionStatusKind::Completed => JobStatus::Completed,
            ExecutionStatusKind::Failed => JobStatus::Failed,
        }
    }
}

#[async_trait]
impl SecretStore for FallbackClient {
    async fn push_requester_secret(&self, index: u32, value: &str) -> Result<(), ProviderError> {
        let requester = self.requester()?.to_checksum(None);
        let response = self
            .http
            .put(self.url(&["secrets", &requester, &index.to_string()]))
            .json(&PushSecretRequest {
                value: value.to_string(),
            })
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("PUT /secrets failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::CONFLICT {
            return Err(ProviderError::AlreadyExists);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error_for_status(status, &text));
        }
        Ok(())
    }
}

#[async_trait]
impl EnclaveJobs for FallbackClient {
    /// With a requester the job reads its stored secret, as an enclave job
    /// would. Without one the payload is decoded and sent in the clear.
    async fn submit(
        &self,
        payload: &IntentPayload,
        target: &ComputeTarget,
    ) -> Result<ExecutionHandle, ProviderError> {
        if self.requester.is_some() {
            return self.submit_job(target).await;
        }
        let intent = decode(payload).map_err(|e| ProviderError::Rejected(e.to_string()))?;
        self.process_intent(&intent).await
    }
}

#[async_trait]
impl JobStatusSource for FallbackClient {
    async fn status(&self, handle: &ExecutionHandle) -> Result<JobStatus, ProviderError> {
        Ok(self.execution_status(handle).await?.status.into())
    }

    async fn fetch_result(&self, handle: &ExecutionHandle) -> Result<Vec<u8>, ProviderError> {
        let status = self.execution_status(handle).await?;
        let result = status
            .result
            .ok_or_else(|| ProviderError::NotFound(format!("result of {handle}")))?;
        serde_json::to_vec(&result).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }
}
