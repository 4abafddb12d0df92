// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Execution proofs and failure records.
//!
//! [`ProofBuilder`] only accepts step results in pipeline order, and each
//! exactly once. [`ExecutionProof`] has no public constructor or setters;
//! once built it is read-only.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use super::{ErrorKind, PipelineFailure, PipelineStep};
use crate::blockchain::{TxRef, UsdcAmount};
use crate::destination::{Credited, ExchangeResponse};
use crate::error::excerpt;

/// A step result was recorded out of order or twice.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Step {got} recorded out of order (expected {expected:?})")]
pub struct ProofOrderError {
    pub expected: Option<PipelineStep>,
    pub got: PipelineStep,
}

/// Accumulates step results while the pipeline runs.
#[derive(Debug, Clone)]
pub struct ProofBuilder {
    destination: Address,
    amount: UsdcAmount,
    last: Option<PipelineStep>,
    relay_account: Option<Address>,
    redistribute: Option<TxRef>,
    funding: Option<TxRef>,
    bridge: Option<TxRef>,
    credit: Option<Credited>,
    transfer: Option<ExchangeResponse>,
}

impl ProofBuilder {
    pub fn new(destination: Address, amount: UsdcAmount) -> Self {
        Self {
            destination,
            amount,
            last: None,
            relay_account: None,
            redistribute: None,
            funding: None,
            bridge: None,
            credit: None,
            transfer: None,
        }
    }

    /// The next step this builder will accept.
    pub fn expected(&self) -> Option<PipelineStep> {
        match self.last {
            None => Some(PipelineStep::RelayGenerated),
            Some(step) => step.next(),
        }
    }

    /// Steps recorded so far, in order.
    pub fn completed_steps(&self) -> Vec<PipelineStep> {
        PipelineStep::ALL
            .into_iter()
            .take_while(|step| Some(*step) <= self.last)
            .collect()
    }

    fn advance(&mut self, step: PipelineStep) -> Result<(), ProofOrderError> {
        let expected = self.expected();
        if expected != Some(step) {
            return Err(ProofOrderError {
                expected,
                got: step,
            });
        }
        self.last = Some(step);
        Ok(())
    }

    pub fn relay_generated(&mut self, relay: Address) -> Result<(), ProofOrderError> {
        self.advance(PipelineStep::RelayGenerated)?;
        self.relay_account = Some(relay);
        Ok(())
    }

    pub fn redistributed(&mut self, tx: TxRef) -> Result<(), ProofOrderError> {
        self.advance(PipelineStep::Redistributed)?;
        self.redistribute = Some(tx);
        Ok(())
    }

    pub fn funded(&mut self, tx: TxRef) -> Result<(), ProofOrderError> {
        self.advance(PipelineStep::Funded)?;
        self.funding = Some(tx);
        Ok(())
    }

    pub fn bridged(&mut self, tx: TxRef) -> Result<(), ProofOrderError> {
        self.advance(PipelineStep::Bridged)?;
        self.bridge = Some(tx);
        Ok(())
    }

    pub fn credited(&mut self, credit: Credited) -> Result<(), ProofOrderError> {
        self.advance(PipelineStep::Credited)?;
        self.credit = Some(credit);
        Ok(())
    }

    pub fn delivered(&mut self, response: ExchangeResponse) -> Result<(), ProofOrderError> {
        self.advance(PipelineStep::DeliveredToDestination)?;
        self.transfer = Some(response);
        Ok(())
    }

    /// Seal the proof. Fails unless all six steps were recorded.
    pub fn finish(&self, timestamp: DateTime<Utc>) -> Result<ExecutionProof, ProofOrderError> {
        let incomplete = || ProofOrderError {
            expected: self.expected(),
            got: PipelineStep::DeliveredToDestination,
        };

        let (Some(relay), Some(redistribute), Some(funding), Some(bridge)) = (
            self.relay_account,
            self.redistribute.as_ref(),
            self.funding.as_ref(),
            self.bridge.as_ref(),
        ) else {
            return Err(incomplete());
        };
        let (Some(_), Some(transfer)) = (self.credit.as_ref(), self.transfer.as_ref()) else {
            return Err(incomplete());
        };

        Ok(ExecutionProof {
            success: true,
            relay_account: relay,
            redistribute_tx_ref: redistribute.tx_hash.clone(),
            funding_tx_ref: funding.tx_hash.clone(),
            bridge_tx_ref: bridge.tx_hash.clone(),
            destination_transfer_result: serde_json::to_value(transfer).unwrap_or_default(),
            destination_account: self.destination,
            amount: self.amount,
            timestamp,
        })
    }
}

/// Tamper-evident record of a completed execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionProof {
    success: bool,
    #[schema(value_type = String)]
    relay_account: Address,
    redistribute_tx_ref: String,
    funding_tx_ref: String,
    bridge_tx_ref: String,
    #[schema(value_type = Object)]
    destination_transfer_result: serde_json::Value,
    #[schema(value_type = String)]
    destination_account: Address,
    #[schema(value_type = String)]
    amount: UsdcAmount,
    timestamp: DateTime<Utc>,
}

impl ExecutionProof {
    pub fn success(&self) -> bool {
        self.success
    }

    pub fn relay_account(&self) -> Address {
        self.relay_account
    }

    pub fn redistribute_tx_ref(&self) -> &str {
        &self.redistribute_tx_ref
    }

    pub fn funding_tx_ref(&self) -> &str {
        &self.funding_tx_ref
    }

    pub fn bridge_tx_ref(&self) -> &str {
        &self.bridge_tx_ref
    }

    pub fn destination_transfer_result(&self) -> &serde_json::Value {
        &self.destination_transfer_result
    }

    /// `status` of the destination exchange response.
    pub fn destination_status(&self) -> Option<&str> {
        self.destination_transfer_result
            .get("status")
            .and_then(|s| s.as_str())
    }

    pub fn destination_account(&self) -> Address {
        self.destination_account
    }

    pub fn amount(&self) -> UsdcAmount {
        self.amount
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// SHA-256 over the canonical compact JSON encoding, `0x`-prefixed hex.
    pub fn digest(&self) -> String {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        format!("0x{}", alloy::hex::encode(Sha256::digest(&canonical)))
    }
}

/// What `result.json` holds when an execution fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    pub success: bool,
    pub failed_at: PipelineStep,
    pub error_kind: ErrorKind,
    /// Bounded human-readable message.
    pub error: String,
    pub completed_steps: Vec<PipelineStep>,
    /// Relay account holding any stranded funds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub relay_account: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redistribute_tx_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_tx_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_tx_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    pub fn from_failure(failure: &PipelineFailure, timestamp: DateTime<Utc>) -> Self {
        let partial = &failure.partial;
        Self {
            success: false,
            failed_at: failure.failed_at,
            error_kind: failure.error.kind(),
            error: excerpt(&failure.error.to_string()),
            completed_steps: partial.completed_steps(),
            relay_account: partial.relay_account,
            redistribute_tx_ref: partial.redistribute.as_ref().map(|tx| tx.tx_hash.clone()),
            funding_tx_ref: partial.funding.as_ref().map(|tx| tx.tx_hash.clone()),
            bridge_tx_ref: partial.bridge.as_ref().map(|tx| tx.tx_hash.clone()),
            timestamp,
        }
    }

    /// A failure before the first step ran, e.g. an undecodable intent.
    pub fn before_start(kind: ErrorKind, error: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: false,
            failed_at: PipelineStep::RelayGenerated,
            error_kind: kind,
            error: excerpt(error),
            completed_steps: Vec::new(),
            relay_account: None,
            redistribute_tx_ref: None,
            funding_tx_ref: None,
            bridge_tx_ref: None,
            timestamp,
        }
    }
}

/// Terminal result of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ExecutionOutcome {
    Completed(ExecutionProof),
    Failed(FailureRecord),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}
