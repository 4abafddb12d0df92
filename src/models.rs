// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the fallback HTTP surface. They are shared
//! by the server handlers and by [`crate::enclave::fallback::FallbackClient`],
//! and derive `ToSchema` for the OpenAPI document.
//!
//! None of these types carry the vault address back to a caller; status
//! responses only expose what the proof itself contains.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::pipeline::{ErrorKind, ExecutionOutcome, PipelineStep};

// =============================================================================
// Intent Submission
// =============================================================================

/// An amount as a JSON string (`"12.5"`) or number (`12.5`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Text(String),
    Number(serde_json::Number),
}

impl fmt::Display for AmountField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Request to run one anonymous transfer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessIntentRequest {
    /// Destination account (`0x` + 40 hex digits).
    #[serde(alias = "hlDestination")]
    pub destination: String,
    /// Decimal token amount, at most 6 fractional digits.
    #[schema(value_type = String, example = "12.5")]
    pub amount: AmountField,
    /// Vault to draw from. Defaults to the configured vault.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<String>,
}

/// Accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessIntentResponse {
    pub execution_id: String,
    pub status: ExecutionStatusKind,
}

// =============================================================================
// Secrets and Jobs
// =============================================================================

/// Body of `PUT /secrets/{requester}/{index}`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PushSecretRequest {
    /// Opaque secret value, stored once and never returned.
    pub value: String,
}

/// Request to run the intent held in a requester's secret slot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitJobRequest {
    /// Requester whose intent secret the job reads.
    pub requester: String,
    /// Enclave app the job was addressed to.
    pub app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workerpool: Option<String>,
}

// =============================================================================
// Execution Status
// =============================================================================

/// Coarse execution state as reported by the fallback server.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatusKind {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ExecutionStatusKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Status of one execution.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatusResponse {
    pub execution_id: String,
    pub status: ExecutionStatusKind,
    /// Last completed pipeline step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<PipelineStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<PipelineStep>,
    /// Proof or failure record, once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ExecutionOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Bounded error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionStatusResponse {
    pub fn new(execution_id: impl Into<String>, status: ExecutionStatusKind) -> Self {
        Self {
            execution_id: execution_id.into(),
            status,
            step: None,
            failed_at: None,
            result: None,
            proof_digest: None,
            error_kind: None,
            error: None,
        }
    }
}
