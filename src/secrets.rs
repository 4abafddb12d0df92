// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Requester Secrets
//!
//! The fallback server's stand-in for the provider's secret store. Secrets
//! are scoped to a requester address and a numeric slot, and are immutable:
//! a second push to an occupied slot fails with [`SecretError::AlreadyExists`].
//!
//! Values live in memory only. They are never logged, persisted, or returned
//! by any endpoint; the server reads them back only to start a job.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::RwLock;

/// Largest accepted secret value, in bytes.
pub const MAX_SECRET_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    #[error("Secret {index} already exists for this requester")]
    AlreadyExists { index: u32 },

    #[error("Secret exceeds {MAX_SECRET_BYTES} bytes")]
    TooLarge,
}

/// Immutable requester-scoped secret slots.
#[derive(Clone, Default)]
pub struct SecretVault {
    inner: Arc<RwLock<HashMap<(Address, u32), String>>>,
}

impl SecretVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` in `requester`'s slot `index`, once.
    pub async fn push(
        &self,
        requester: Address,
        index: u32,
        value: String,
    ) -> Result<(), SecretError> {
        if value.len() > MAX_SECRET_BYTES {
            return Err(SecretError::TooLarge);
        }

        let mut inner = self.inner.write().await;
        if inner.contains_key(&(requester, index)) {
            return Err(SecretError::AlreadyExists { index });
        }
        inner.insert((requester, index), value);
        Ok(())
    }

    pub async fn get(&self, requester: Address, index: u32) -> Option<String> {
        self.inner.read().await.get(&(requester, index)).cloned()
    }
}

impl fmt::Debug for SecretVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretVault").finish_non_exhaustive()
    }
}
