// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::executions::ExecutionRegistry;
use crate::pipeline::IntentExecutor;
use crate::secrets::SecretVault;
use crate::storage::EncryptedStorage;

#[derive(Clone)]
pub struct AppState {
    pub executions: ExecutionRegistry,
    /// `None` when no operator key is configured; submissions are refused.
    pub executor: Option<Arc<dyn IntentExecutor>>,
    pub secrets: SecretVault,
    pub default_vault: Option<Address>,
    /// Parent token of every running execution.
    pub shutdown: CancellationToken,
    /// Every execution task; drained before the process exits.
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(executor: Option<Arc<dyn IntentExecutor>>) -> Self {
        Self {
            executions: ExecutionRegistry::new(),
            executor,
            secrets: SecretVault::new(),
            default_vault: None,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    pub fn with_storage(mut self, storage: Arc<EncryptedStorage>) -> Self {
        self.executions = self.executions.with_storage(storage);
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.executions = self.executions.with_retention(retention);
        self
    }

    pub fn with_default_vault(mut self, vault: Option<Address>) -> Self {
        self.default_vault = vault;
        self
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn storage(&self) -> Option<&Arc<EncryptedStorage>> {
        self.executions.storage()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(None)
    }
}
