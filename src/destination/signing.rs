// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EIP-712 signing for Hyperliquid `usdSend` actions.
//!
//! The primary type name contains a colon
//! (`HyperliquidTransaction:UsdSend`), which `sol!` structs cannot express,
//! so the struct hash is assembled by hand and combined with an alloy
//! [`Eip712Domain`].

use std::fmt;
use std::str::FromStr;

use alloy::{
    primitives::{keccak256, Address, B256},
    signers::{local::PrivateKeySigner, SignerSync},
    sol_types::{eip712_domain, Eip712Domain},
};
use serde::{Deserialize, Serialize};

use super::client::DestinationError;
use crate::blockchain::UsdcAmount;

/// Chain id the destination expects in the signing domain. This is a
/// constant of the destination network and is never read from the source
/// RPC.
pub const SIGNATURE_CHAIN_ID: u64 = 421614;

/// [`SIGNATURE_CHAIN_ID`] as the hex string carried in the action body.
pub const SIGNATURE_CHAIN_ID_HEX: &str = "0x66eee";

const USD_SEND_TYPE: &str = concat!(
    "HyperliquidTransaction:UsdSend(",
    "string hyperliquidChain,string destination,string amount,uint64 time)"
);

/// Which Hyperliquid deployment the action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DestinationChain {
    #[default]
    Testnet,
    Mainnet,
}

impl DestinationChain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Testnet => "Testnet",
            Self::Mainnet => "Mainnet",
        }
    }
}

impl fmt::Display for DestinationChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DestinationChain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "testnet" => Ok(Self::Testnet),
            "mainnet" => Ok(Self::Mainnet),
            other => Err(format!("unknown destination chain: {other}")),
        }
    }
}

/// The `action` object of an `/exchange` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsdSendAction {
    #[serde(rename = "type")]
    pub kind: String,
    pub hyperliquid_chain: String,
    pub signature_chain_id: String,
    pub destination: String,
    pub amount: String,
    pub time: u64,
}

/// Split ECDSA signature, `v ∈ {27, 28}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSignature {
    pub r: B256,
    pub s: B256,
    pub v: u8,
}

/// Complete `/exchange` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedUsdSend {
    pub action: UsdSendAction,
    pub nonce: u64,
    pub signature: ActionSignature,
}

/// The fixed signing domain.
pub fn signing_domain() -> Eip712Domain {
    eip712_domain! {
        name: "HyperliquidSignTransaction",
        version: "1",
        chain_id: SIGNATURE_CHAIN_ID,
        verifying_contract: Address::ZERO,
    }
}

/// EIP-712 digest of a `UsdSend` message.
pub fn usd_send_digest(
    chain: DestinationChain,
    destination: &str,
    amount: &str,
    time: u64,
) -> B256 {
    let mut encoded = Vec::with_capacity(5 * 32);
    encoded.extend_from_slice(keccak256(USD_SEND_TYPE.as_bytes()).as_slice());
    encoded.extend_from_slice(keccak256(chain.as_str().as_bytes()).as_slice());
    encoded.extend_from_slice(keccak256(destination.as_bytes()).as_slice());
    encoded.extend_from_slice(keccak256(amount.as_bytes()).as_slice());
    // uint64 left-padded to a 32-byte word.
    encoded.extend_from_slice(&[0u8; 24]);
    encoded.extend_from_slice(&time.to_be_bytes());
    let struct_hash = keccak256(&encoded);

    let mut message = Vec::with_capacity(2 + 32 + 32);
    message.extend_from_slice(&[0x19, 0x01]);
    message.extend_from_slice(signing_domain().separator().as_slice());
    message.extend_from_slice(struct_hash.as_slice());
    keccak256(&message)
}

/// Build and sign a `usdSend` moving `amount` to `destination`.
///
/// `time_ms` is both the action timestamp and the nonce.
pub fn sign_usd_send(
    signer: &PrivateKeySigner,
    chain: DestinationChain,
    destination: Address,
    amount: UsdcAmount,
    time_ms: u64,
) -> Result<SignedUsdSend, DestinationError> {
    let destination = destination.to_checksum(None);
    let amount = amount.to_string();

    let digest = usd_send_digest(chain, &destination, &amount, time_ms);
    let signature = signer
        .sign_hash_sync(&digest)
        .map_err(|e| DestinationError::Signing(e.to_string()))?;

    Ok(SignedUsdSend {
        action: UsdSendAction {
            kind: "usdSend".to_string(),
            hyperliquid_chain: chain.as_str().to_string(),
            signature_chain_id: SIGNATURE_CHAIN_ID_HEX.to_string(),
            destination,
            amount,
            time: time_ms,
        },
        nonce: time_ms,
        signature: ActionSignature {
            r: B256::from(signature.r()),
            s: B256::from(signature.s()),
            v: 27 + u8::from(signature.v()),
        },
    })
}
