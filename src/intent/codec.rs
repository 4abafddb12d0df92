// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Deterministic intent encoding.
//!
//! The payload is compact JSON with a fixed key order
//! (`destination`, `amount`, `vaultAddress`), addresses in EIP-55 form and
//! the amount as its shortest decimal string. Equal intents always encode
//! to identical bytes, and [`decode`] is the exact inverse of [`encode`].

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{parse_account, Intent, IntentError};
use crate::blockchain::UsdcAmount;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct IntentWire {
    destination: String,
    amount: UsdcAmount,
    vault_address: String,
}

/// Opaque, encoded intent handed to the enclave job provider.
#[derive(Clone, PartialEq, Eq)]
pub struct IntentPayload(String);

impl IntentPayload {
    /// Wrap a payload received from the provider's secret store.
    pub fn from_secret(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// The payload links depositor and destination; keep it out of logs.
impl fmt::Debug for IntentPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IntentPayload(<{} bytes>)", self.0.len())
    }
}

impl Intent {
    /// Encode this intent into its canonical payload.
    pub fn to_payload(&self) -> IntentPayload {
        let wire = IntentWire {
            destination: self.destination().to_checksum(None),
            amount: self.amount(),
            vault_address: self.vault().to_checksum(None),
        };
        // A struct of strings always serializes.
        IntentPayload(serde_json::to_string(&wire).unwrap_or_default())
    }
}

/// Validate and encode a transfer request.
///
/// Fails with a validation error if the destination is malformed, the
/// amount has more than 6 fractional digits, or it is below the minimum.
pub fn encode(destination: &str, amount: &str, vault: &str) -> Result<IntentPayload, IntentError> {
    let amount = UsdcAmount::parse(amount)?;
    Ok(Intent::new(destination, amount, vault)?.to_payload())
}

/// Decode and re-validate a payload.
pub fn decode(payload: &IntentPayload) -> Result<Intent, IntentError> {
    let wire: IntentWire = serde_json::from_str(payload.as_str())
        .map_err(|e| IntentError::Malformed(e.to_string()))?;

    let destination = parse_account("destination", &wire.destination)?;
    let vault = parse_account("vaultAddress", &wire.vault_address)?;
    Intent::from_parts(destination, wire.amount, vault)
}
