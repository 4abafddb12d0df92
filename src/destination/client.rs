// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hyperliquid HTTP API client.
//!
//! - `POST /info` with `clearinghouseState` reads an account's value
//! - `POST /exchange` submits a signed action

use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::signing::SignedUsdSend;
use crate::blockchain::UsdcAmount;
use crate::error::excerpt;

/// Public Hyperliquid testnet API.
pub const HL_TESTNET_API: &str = "https://api.hyperliquid-testnet.xyz";

/// Errors raised by destination-network operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestinationError {
    /// A query failed in a way that polling should absorb.
    #[error("Destination query failed: {0}")]
    Transient(String),

    #[error("Destination submission failed: {0}")]
    Submission(String),

    /// The exchange answered with `status: "err"`.
    #[error("Destination rejected the transfer: {0}")]
    Rejected(String),

    #[error("Failed to sign destination action: {0}")]
    Signing(String),

    #[error("Invalid destination response: {0}")]
    InvalidResponse(String),

    #[error("Bridge credit not observed after {attempts} attempts ({waited:?})")]
    BridgeTimeout { attempts: u32, waited: Duration },

    #[error("Credit wait cancelled")]
    Cancelled,
}

/// Response of an accepted `/exchange` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeResponse {
    pub status: String,
    #[serde(default)]
    pub response: Value,
}

/// The destination-network operations the pipeline depends on.
#[async_trait]
pub trait DestinationLedger: Send + Sync {
    /// Current account value of `account`; a missing account reads as zero.
    async fn account_value(&self, account: Address) -> Result<UsdcAmount, DestinationError>;

    /// Submit a signed transfer. An explicit `err` status is
    /// [`DestinationError::Rejected`].
    async fn submit_usd_send(
        &self,
        request: &SignedUsdSend,
    ) -> Result<ExchangeResponse, DestinationError>;
}

/// Hyperliquid API client.
#[derive(Clone)]
pub struct HyperliquidClient {
    http: Client,
    api_base_url: String,
}

impl HyperliquidClient {
    pub fn new(api_base_url: impl Into<String>) -> Result<Self, DestinationError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| {
                DestinationError::Submission(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            api_base_url: api_base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }
}

/// Read `marginSummary.accountValue`; absent or `null` state is zero.
fn parse_account_value(state: &Value) -> Result<UsdcAmount, DestinationError> {
    let value = state
        .get("marginSummary")
        .and_then(|s| s.get("accountValue"));

    match value {
        None | Some(Value::Null) => Ok(UsdcAmount::ZERO),
        Some(Value::String(s)) => UsdcAmount::parse_floor(s)
            .map_err(|e| DestinationError::Transient(format!("bad accountValue {s:?}: {e}"))),
        Some(Value::Number(n)) => UsdcAmount::parse_floor(&n.to_string())
            .map_err(|e| DestinationError::Transient(format!("bad accountValue {n}: {e}"))),
        Some(other) => Err(DestinationError::Transient(format!(
            "unexpected accountValue: {other}"
        ))),
    }
}

#[async_trait]
impl DestinationLedger for HyperliquidClient {
    async fn account_value(&self, account: Address) -> Result<UsdcAmount, DestinationError> {
        let body = json!({
            "type": "clearinghouseState",
            "user": account.to_checksum(None),
        });

        let response = self
            .http
            .post(self.url("/info"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DestinationError::Transient(format!("POST /info failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(DestinationError::Transient(format!(
                "POST /info returned {status}"
            )));
        }

        let state: Value = response
            .json()
            .await
            .map_err(|e| DestinationError::Transient(format!("POST /info invalid JSON: {e}")))?;

        parse_account_value(&state)
    }

    async fn submit_usd_send(
        &self,
        request: &SignedUsdSend,
    ) -> Result<ExchangeResponse, DestinationError> {
        debug!(nonce = request.nonce, "Submitting usdSend");

        let response = self
            .http
            .post(self.url("/exchange"))
            .json(request)
            .send()
            .await
            .map_err(|e| DestinationError::Submission(format!("POST /exchange failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        let parsed: ExchangeResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                return Err(DestinationError::Submission(excerpt(&format!(
                    "POST /exchange returned {status}: {text}"
                ))))
            }
            Err(e) => {
                return Err(DestinationError::InvalidResponse(excerpt(&format!(
                    "{e}: {text}"
                ))))
            }
        };

        match parsed.status.as_str() {
            "ok" => Ok(parsed),
            "err" => {
                let detail = match &parsed.response {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                warn!(detail = %excerpt(&detail), "usdSend rejected");
                Err(DestinationError::Rejected(excerpt(&detail)))
            }
            other => Err(DestinationError::InvalidResponse(format!(
                "unknown status {other:?}"
            ))),
        }
    }
}
