// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Execution outcome repository.
//!
//! Each terminal outcome is stored as `/data/executions/{execution_id}.json`.
//! Only the proof or failure record is written; the intent never is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{EncryptedStorage, StorageError, StorageResult};
use crate::pipeline::ExecutionOutcome;

/// Terminal outcome as persisted on the sealed filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredExecution {
    pub execution_id: String,
    pub outcome: ExecutionOutcome,
    /// Digest of the proof, for completed executions.
    pub proof_digest: Option<String>,
    pub stored_at: DateTime<Utc>,
}

impl StoredExecution {
    pub fn new(execution_id: impl Into<String>, outcome: ExecutionOutcome) -> Self {
        let proof_digest = match &outcome {
            ExecutionOutcome::Completed(proof) => Some(proof.digest()),
            ExecutionOutcome::Failed(_) => None,
        };
        Self {
            execution_id: execution_id.into(),
            outcome,
            proof_digest,
            stored_at: Utc::now(),
        }
    }
}

/// Repository for execution outcomes.
pub struct ExecutionRepository<'a> {
    storage: &'a EncryptedStorage,
}

impl<'a> ExecutionRepository<'a> {
    pub fn new(storage: &'a EncryptedStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, execution_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().execution(execution_id))
    }

    /// Store a terminal outcome. Outcomes are written once.
    pub fn save(&self, execution: &StoredExecution) -> StorageResult<()> {
        let execution_id = &execution.execution_id;
        if self.exists(execution_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Execution {execution_id}"
            )));
        }

        self.storage
            .write_json(self.storage.paths().execution(execution_id), execution)
    }

    pub fn get(&self, execution_id: &str) -> StorageResult<StoredExecution> {
        let path = self.storage.paths().execution(execution_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Execution {execution_id}")));
        }
        self.storage.read_json(path)
    }
}
