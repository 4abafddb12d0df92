// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave job provider interface.
//!
//! The pipeline runs as a confidential job on a TEE provider. This module
//! defines what the rest of the crate needs from such a provider:
//!
//! - a submitter-scoped secret store that carries the encoded intent
//! - job submission returning an [`ExecutionHandle`]
//! - job status and result retrieval for the tracker
//!
//! [`fallback::FallbackClient`] implements submission and status against the
//! non-enclave HTTP server.

pub mod fallback;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::intent::{register_intent, Intent, IntentPayload, Registration};

/// Opaque correlation id for one execution (deal/task id, or a UUID on the
/// fallback server).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionHandle(String);

impl ExecutionHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-side job state, with the provider's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Unset,
    Active,
    Revealing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Unset),
            1 => Some(Self::Active),
            2 => Some(Self::Revealing),
            3 => Some(Self::Completed),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Unset => 0,
            Self::Active => 1,
            Self::Revealing => 2,
            Self::Completed => 3,
            Self::Failed => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unset => "UNSET",
            Self::Active => "ACTIVE",
            Self::Revealing => "REVEALING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Where a job runs: the registered enclave app, and optionally a
/// specific worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeTarget {
    pub app: String,
    pub workerpool: Option<String>,
}

/// Errors reported by a job provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Secret already exists")]
    AlreadyExists,

    #[error("Unknown execution: {0}")]
    NotFound(String),

    #[error("Provider request failed: {0}")]
    Transport(String),

    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

/// Submitter-scoped secret storage. Secrets are immutable once pushed.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn push_requester_secret(&self, index: u32, value: &str) -> Result<(), ProviderError>;
}

/// Job submission.
#[async_trait]
pub trait EnclaveJobs: Send + Sync {
    async fn submit(
        &self,
        payload: &IntentPayload,
        target: &ComputeTarget,
    ) -> Result<ExecutionHandle, ProviderError>;
}

/// Job observation, used by the tracker. Never sees the intent.
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    async fn status(&self, handle: &ExecutionHandle) -> Result<JobStatus, ProviderError>;

    /// Raw bytes of the job's `result.json`.
    async fn fetch_result(&self, handle: &ExecutionHandle) -> Result<Vec<u8>, ProviderError>;
}

/// Outcome of [`submit_intent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub handle: ExecutionHandle,
    pub registration: Registration,
}

/// Encode, register and submit an intent.
///
/// Returns as soon as the provider has accepted the job; the pipeline runs
/// asynchronously and is observed through the returned handle.
pub async fn submit_intent<S, J>(
    secrets: &S,
    jobs: &J,
    target: &ComputeTarget,
    intent: &Intent,
) -> Result<Submission, ProviderError>
where
    S: SecretStore + ?Sized,
    J: EnclaveJobs + ?Sized,
{
    let payload = intent.to_payload();
    let registration = register_intent(secrets, &payload).await?;
    let handle = jobs.submit(&payload, target).await?;

    info!(handle = %handle, app = %target.app, ?registration, "Execution submitted");

    Ok(Submission {
        handle,
        registration,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::blockchain::UsdcAmount;

    /// In-memory secret store with the provider's immutability rule.
    #[derive(Default)]
    pub(crate) struct MemorySecretStore {
        pub secrets: Mutex<HashMap<u32, String>>,
    }

    #[async_trait]
    impl SecretStore for MemorySecretStore {
        async fn push_requester_secret(
            &self,
            index: u32,
            value: &str,
        ) -> Result<(), ProviderError> {
            let mut secrets = self.secrets.lock().unwrap();
            if secrets.contains_key(&index) {
                return Err(ProviderError::AlreadyExists);
            }
            secrets.insert(index, value.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingJobs {
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EnclaveJobs for RecordingJobs {
        async fn submit(
            &self,
            payload: &IntentPayload,
            _target: &ComputeTarget,
        ) -> Result<ExecutionHandle, ProviderError> {
            let mut submitted = self.submitted.lock().unwrap();
            submitted.push(payload.as_str().to_string());
            Ok(ExecutionHandle::new(format!("0xdeal{}", submitted.len())))
        }
    }

    fn target() -> ComputeTarget {
        ComputeTarget {
            app: "0xapp".to_string(),
            workerpool: None,
        }
    }

    fn intent() -> Intent {
        Intent::new(
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            UsdcAmount::from_whole(5),
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8",
        )
        .unwrap()
    }

    #[test]
    fn job_status_codes_round_trip() {
        for code in 0..=4 {
            assert_eq!(JobStatus::from_code(code).unwrap().code(), code);
        }
        assert_eq!(JobStatus::from_code(5), None);
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Revealing.is_terminal());
    }

    #[tokio::test]
    async fn resubmission_reuses_existing_secret() {
        let secrets = MemorySecretStore::default();
        let jobs = RecordingJobs::default();

        let first = submit_intent(&secrets, &jobs, &target(), &intent()).await.unwrap();
        let second = submit_intent(&secrets, &jobs, &target(), &intent()).await.unwrap();

        assert_eq!(first.registration, Registration::Created);
        assert_eq!(second.registration, Registration::Reused);
        assert_ne!(first.handle, second.handle);
        assert_eq!(jobs.submitted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn registration_errors_stop_submission() {
        struct Offline;

        #[async_trait]
        impl SecretStore for Offline {
            async fn push_requester_secret(&self, _: u32, _: &str) -> Result<(), ProviderError> {
                Err(ProviderError::Transport("connection refused".to_string()))
            }
        }

        let jobs = RecordingJobs::default();
        let err = submit_intent(&Offline, &jobs, &target(), &intent()).await.unwrap_err();

        assert!(matches!(err, ProviderError::Transport(_)));
        assert!(jobs.submitted.lock().unwrap().is_empty());
    }
}
