// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Execution Tracker
//!
//! Client-side state machine over an opaque [`ExecutionHandle`]:
//!
//! ```text
//! submitted → active → { completed | failed }
//! ```
//!
//! The tracker only sees provider job status and the result artifact; it
//! never holds the intent. Only an explicit terminal job status moves it to a
//! terminal state. A failed poll leaves the state where it was.
//!
//! ## Shutdown
//!
//! [`ExecutionTracker::run`] owns its polling loop and stops on a terminal
//! state or when its `CancellationToken` fires.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::blockchain::UsdcAmount;
use crate::enclave::{ExecutionHandle, JobStatus, JobStatusSource};
use crate::error::excerpt;
use crate::pipeline::{ExecutionOutcome, PipelineStep};

/// Default interval between status polls.
pub const DEFAULT_TRACK_INTERVAL: Duration = Duration::from_secs(5);

/// Human-observable execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackedState {
    Submitted,
    Active,
    Completed,
    Failed,
}

impl TrackedState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for TrackedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Submitted => "submitted",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// The parts of a proof a client is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofExcerpt {
    pub destination: Address,
    pub amount: UsdcAmount,
    pub bridge_tx_ref: String,
    pub destination_status: Option<String>,
}

/// Last known status of a tracked execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedStatus {
    pub state: TrackedState,
    /// Provider status label, or a neutral note after a failed poll.
    pub raw_detail: String,
    pub failed_at: Option<PipelineStep>,
    /// Bounded failure message.
    pub error: Option<String>,
    pub proof_excerpt: Option<ProofExcerpt>,
}

impl TrackedStatus {
    fn submitted() -> Self {
        Self {
            state: TrackedState::Submitted,
            raw_detail: JobStatus::Unset.to_string(),
            failed_at: None,
            error: None,
            proof_excerpt: None,
        }
    }
}

/// Polls one execution until it reaches a terminal state.
pub struct ExecutionTracker<S: ?Sized> {
    source: Arc<S>,
    handle: ExecutionHandle,
    interval: Duration,
    status: TrackedStatus,
}

impl<S: JobStatusSource + ?Sized> ExecutionTracker<S> {
    pub fn new(source: Arc<S>, handle: ExecutionHandle) -> Self {
        Self {
            source,
            handle,
            interval: DEFAULT_TRACK_INTERVAL,
            status: TrackedStatus::submitted(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn handle(&self) -> &ExecutionHandle {
        &self.handle
    }

    pub fn status(&self) -> &TrackedStatus {
        &self.status
    }

    /// Query the provider once and update the tracked status.
    ///
    /// Makes no request once a terminal state has been reached.
    pub async fn poll(&mut self) -> &TrackedStatus {
        if self.status.state.is_terminal() {
            return &self.status;
        }

        let job = match self.source.status(&self.handle).await {
            Ok(job) => job,
            Err(e) => {
                warn!(handle = %self.handle, error = %e, "Status poll failed");
                self.status.raw_detail = "waiting".to_string();
                return &self.status;
            }
        };

        debug!(handle = %self.handle, status = %job, "Status polled");
        self.status.raw_detail = job.to_string();

        match job {
            JobStatus::Unset => {}
            JobStatus::Active | JobStatus::Revealing => {
                self.status.state = TrackedState::Active;
            }
            JobStatus::Completed => {
                self.status.state = TrackedState::Completed;
                self.read_result().await;
            }
            JobStatus::Failed => {
                self.status.state = TrackedState::Failed;
                self.read_result().await;
            }
        }

        &self.status
    }

    /// Best-effort fetch of the result artifact after a terminal status.
    async fn read_result(&mut self) {
        let bytes = match self.source.fetch_result(&self.handle).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(handle = %self.handle, error = %e, "Result fetch failed");
                return;
            }
        };

        match serde_json::from_slice::<ExecutionOutcome>(&bytes) {
            Ok(ExecutionOutcome::Completed(proof)) => {
                self.status.proof_excerpt = Some(ProofExcerpt {
                    destination: proof.destination_account(),
                    amount: proof.amount(),
                    bridge_tx_ref: proof.bridge_tx_ref().to_string(),
                    destination_status: proof.destination_status().map(str::to_string),
                });
            }
            Ok(ExecutionOutcome::Failed(record)) => {
                self.status.failed_at = Some(record.failed_at);
                self.status.error = Some(excerpt(&record.error));
            }
            Err(e) => {
                warn!(handle = %self.handle, error = %e, "Result artifact unreadable");
            }
        }
    }

    /// Poll on the configured interval until terminal or cancelled.
    ///
    /// `on_update` is called whenever the tracked status changes. Returns the
    /// last known status.
    pub async fn run<F>(mut self, cancel: CancellationToken, mut on_update: F) -> TrackedStatus
    where
        F: FnMut(&TrackedStatus) + Send,
    {
        info!(
            handle = %self.handle,
            interval_secs = self.interval.as_secs(),
            "Execution tracker starting"
        );

        loop {
            if cancel.is_cancelled() {
                info!(handle = %self.handle, "Execution tracker cancelled");
                return self.status;
            }

            let before = self.status.clone();
            self.poll().await;
            let current = &self.status;
            if *current != before {
                on_update(current);
            }

            if current.state.is_terminal() {
                info!(handle = %self.handle, state = %current.state, "Execution tracker finished");
                return self.status;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = cancel.cancelled() => {
                    info!(handle = %self.handle, "Execution tracker cancelled");
                    return self.status;
                }
            }
        }
    }
}
