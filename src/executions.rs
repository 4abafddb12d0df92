// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Execution Registry
//!
//! In-memory view of fallback-server executions keyed by execution id. The
//! registry only holds progress and terminal outcomes; an intent lives in the
//! spawned task that runs it and nowhere else.
//!
//! Terminal outcomes are also written to sealed storage, which answers
//! lookups once the in-memory record has been evicted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::json;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::excerpt;
use crate::intent::Intent;
use crate::models::{ExecutionStatusKind, ExecutionStatusResponse};
use crate::pipeline::{ExecutionOutcome, IntentExecutor, PipelineState, PipelineStep};
use crate::storage::{
    AuditEvent, AuditEventType, AuditRepository, EncryptedStorage, ExecutionRepository,
    StorageError, StoredExecution,
};

/// One tracked execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub execution_id: String,
    pub state: PipelineState,
    pub outcome: Option<ExecutionOutcome>,
    pub proof_digest: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionRecord {
    fn pending(execution_id: String) -> Self {
        let now = Utc::now();
        Self {
            execution_id,
            state: PipelineState::Pending,
            outcome: None,
            proof_digest: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    pub fn status_kind(&self) -> ExecutionStatusKind {
        match self.state {
            PipelineState::Pending => ExecutionStatusKind::Pending,
            PipelineState::Reached(_) => ExecutionStatusKind::Processing,
            PipelineState::Completed => ExecutionStatusKind::Completed,
            PipelineState::Failed { .. } => ExecutionStatusKind::Failed,
        }
    }

    /// Status body for `GET /status/{executionId}`.
    pub fn to_response(&self) -> ExecutionStatusResponse {
        let mut response = ExecutionStatusResponse::new(&self.execution_id, self.status_kind());

        match self.state {
            PipelineState::Reached(step) => response.step = Some(step),
            PipelineState::Completed => response.step = Some(PipelineStep::DeliveredToDestination),
            PipelineState::Failed { at } => response.failed_at = Some(at),
            PipelineState::Pending => {}
        }

        if let Some(ExecutionOutcome::Failed(record)) = &self.outcome {
            response.step = record.completed_steps.last().copied();
            response.error_kind = Some(record.error_kind);
            response.error = Some(excerpt(&record.error));
        }
        response.result = self.outcome.clone();
        response.proof_digest = self.proof_digest.clone();
        response
    }
}

/// How long a terminal execution stays in memory by default.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Pause between eviction sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared registry of executions.
///
/// Running executions are always in memory. Terminal ones are evicted after
/// the retention window; with sealed storage attached, lookups that miss
/// memory fall through to the stored outcome.
#[derive(Clone)]
pub struct ExecutionRegistry {
    inner: Arc<RwLock<HashMap<String, ExecutionRecord>>>,
    storage: Option<Arc<EncryptedStorage>>,
    retention: Duration,
}

impl Default for ExecutionRegistry {
    fn default() -> Self {
        Self {
            inner: Arc::default(),
            storage: None,
            retention: DEFAULT_RETENTION,
        }
    }
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, storage: Arc<EncryptedStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn storage(&self) -> Option<&Arc<EncryptedStorage>> {
        self.storage.as_ref()
    }

    /// Register a new pending execution and return its id.
    pub async fn insert_pending(&self) -> String {
        let execution_id = Uuid::new_v4().to_string();
        self.inner.write().await.insert(
            execution_id.clone(),
            ExecutionRecord::pending(execution_id.clone()),
        );
        execution_id
    }

    pub async fn get(&self, execution_id: &str) -> Option<ExecutionRecord> {
        if let Some(record) = self.inner.read().await.get(execution_id) {
            return Some(record.clone());
        }
        self.load(execution_id)
    }

    /// Number of executions held in memory.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Record pipeline progress. Terminal records are never moved back.
    pub async fn update_state(&self, execution_id: &str, state: PipelineState) {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.get_mut(execution_id) {
            if record.outcome.is_some() {
                return;
            }
            record.state = state;
            record.updated_at = Utc::now();
        }
    }

    /// Record the terminal outcome.
    pub async fn finish(&self, execution_id: &str, outcome: ExecutionOutcome) {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner.get_mut(execution_id) {
            record.state = terminal_state(&outcome);
            record.proof_digest = match &outcome {
                ExecutionOutcome::Completed(proof) => Some(proof.digest()),
                ExecutionOutcome::Failed(_) => None,
            };
            record.outcome = Some(outcome);
            record.updated_at = Utc::now();
        }
    }

    /// Drop terminal records last updated more than the retention window
    /// before `now`. Returns how many were dropped.
    pub async fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let retention = TimeDelta::from_std(self.retention).unwrap_or(TimeDelta::MAX);
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, record| record.outcome.is_none() || now - record.updated_at < retention);
        before - inner.len()
    }

    /// Evict on every [`SWEEP_INTERVAL`] tick until `shutdown` fires.
    pub async fn sweep(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let evicted = self.evict_expired(Utc::now()).await;
                    if evicted > 0 {
                        debug!(evicted, "Evicted finished executions");
                    }
                }
            }
        }
    }

    /// Stored outcome for an id that is no longer in memory.
    fn load(&self, execution_id: &str) -> Option<ExecutionRecord> {
        let storage = self.storage.as_ref()?;
        // Ids are UUIDs; anything else never names a stored file.
        Uuid::parse_str(execution_id).ok()?;

        match ExecutionRepository::new(storage).get(execution_id) {
            Ok(stored) => Some(ExecutionRecord::from(stored)),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => {
                warn!(execution_id, error = %e, "Failed to read stored execution");
                None
            }
        }
    }
}

impl From<StoredExecution> for ExecutionRecord {
    fn from(stored: StoredExecution) -> Self {
        Self {
            execution_id: stored.execution_id,
            state: terminal_state(&stored.outcome),
            outcome: Some(stored.outcome),
            proof_digest: stored.proof_digest,
            submitted_at: stored.stored_at,
            updated_at: stored.stored_at,
        }
    }
}

fn terminal_state(outcome: &ExecutionOutcome) -> PipelineState {
    match outcome {
        ExecutionOutcome::Completed(_) => PipelineState::Completed,
        ExecutionOutcome::Failed(failure) => PipelineState::Failed {
            at: failure.failed_at,
        },
    }
}

/// Start one execution on `tasks`.
///
/// Returns the execution id immediately. The intent moves into the spawned
/// task; progress flows into `registry` through a watch channel.
pub async fn launch(
    registry: &ExecutionRegistry,
    tasks: &TaskTracker,
    executor: Arc<dyn IntentExecutor>,
    intent: Intent,
    shutdown: &CancellationToken,
) -> String {
    let execution_id = registry.insert_pending().await;
    let cancel = shutdown.child_token();
    let (progress, mut progress_rx) = watch::channel(PipelineState::Pending);

    if let Some(storage) = registry.storage() {
        log_audit(
            storage,
            AuditEvent::new(AuditEventType::ExecutionSubmitted, &execution_id),
        );
    }

    let forward_registry = registry.clone();
    let forward_id = execution_id.clone();
    tasks.spawn(async move {
        while progress_rx.changed().await.is_ok() {
            let state = *progress_rx.borrow_and_update();
            forward_registry.update_state(&forward_id, state).await;
            if state.is_terminal() {
                break;
            }
        }
    });

    let task_registry = registry.clone();
    let task_id = execution_id.clone();
    tasks.spawn(async move {
        info!(execution_id = %task_id, "Execution started");

        let outcome = match executor.execute(intent, progress, cancel).await {
            Ok(proof) => ExecutionOutcome::Completed(proof),
            Err(failure) => ExecutionOutcome::Failed(failure.record()),
        };

        if let Some(storage) = task_registry.storage() {
            persist(storage, &task_id, &outcome);
        }
        task_registry.finish(&task_id, outcome).await;
    });

    execution_id
}

fn persist(storage: &EncryptedStorage, execution_id: &str, outcome: &ExecutionOutcome) {
    let stored = StoredExecution::new(execution_id, outcome.clone());
    if let Err(e) = ExecutionRepository::new(storage).save(&stored) {
        error!(execution_id, error = %e, "Failed to persist execution outcome");
    }

    let event = match outcome {
        ExecutionOutcome::Completed(proof) => {
            AuditEvent::new(AuditEventType::ExecutionCompleted, execution_id)
                .with_details(json!({ "proofDigest": proof.digest() }))
        }
        ExecutionOutcome::Failed(record) => {
            AuditEvent::new(AuditEventType::ExecutionFailed, execution_id)
                .with_details(json!({
                    "failedAt": record.failed_at,
                    "errorKind": record.error_kind,
                }))
                .failed(excerpt(&record.error))
        }
    };
    log_audit(storage, event);
}

fn log_audit(storage: &EncryptedStorage, event: AuditEvent) {
    if let Err(e) = AuditRepository::new(storage).log(&event) {
        warn!(execution_id = %event.execution_id, error = %e, "Failed to write audit event");
    }
}
