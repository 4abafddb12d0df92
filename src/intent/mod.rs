// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transfer intents.
//!
//! An [`Intent`] is the only input to an execution. It can only be built
//! through its validating constructors, so every `Intent` the pipeline sees
//! already has a well-formed destination and an amount at or above
//! [`MIN_AMOUNT`].

pub mod codec;
pub mod registration;

use alloy::primitives::Address;

use crate::blockchain::{AmountError, UsdcAmount};

pub use codec::{decode, encode, IntentPayload};
pub use registration::{register_intent, Registration, INTENT_SECRET_INDEX};

/// Protocol minimum transfer: 5 whole tokens.
pub const MIN_AMOUNT: UsdcAmount = UsdcAmount::from_whole(5);

/// Errors raised while validating or decoding an intent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntentError {
    #[error("Invalid {field}: {reason}")]
    InvalidAccount { field: &'static str, reason: String },

    #[error("Amount {0} is below the minimum of {MIN_AMOUNT}")]
    BelowMinimum(UsdcAmount),

    #[error("Invalid amount: {0}")]
    Amount(#[from] AmountError),

    #[error("Malformed intent payload: {0}")]
    Malformed(String),
}

/// A validated transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    destination: Address,
    amount: UsdcAmount,
    vault: Address,
}

impl Intent {
    /// Validate textual account identifiers and build an intent.
    pub fn new(destination: &str, amount: UsdcAmount, vault: &str) -> Result<Self, IntentError> {
        let destination = parse_account("destination", destination)?;
        let vault = parse_account("vaultAddress", vault)?;
        Self::from_parts(destination, amount, vault)
    }

    /// Build an intent from already-parsed addresses.
    pub fn from_parts(
        destination: Address,
        amount: UsdcAmount,
        vault: Address,
    ) -> Result<Self, IntentError> {
        if destination == Address::ZERO {
            return Err(IntentError::InvalidAccount {
                field: "destination",
                reason: "zero address".to_string(),
            });
        }
        if amount < MIN_AMOUNT {
            return Err(IntentError::BelowMinimum(amount));
        }

        Ok(Self {
            destination,
            amount,
            vault,
        })
    }

    pub fn destination(&self) -> Address {
        self.destination
    }

    pub fn amount(&self) -> UsdcAmount {
        self.amount
    }

    pub fn vault(&self) -> Address {
        self.vault
    }
}

/// Parse a `0x`-prefixed 20-byte account identifier.
///
/// All-lowercase and all-uppercase hex are accepted as-is. Mixed case is
/// treated as an EIP-55 checksum and must match.
pub fn parse_account(field: &'static str, value: &str) -> Result<Address, IntentError> {
    let invalid = |reason: &str| IntentError::InvalidAccount {
        field,
        reason: reason.to_string(),
    };

    let hex = value
        .strip_prefix("0x")
        .ok_or_else(|| invalid("missing 0x prefix"))?;
    if hex.len() != 40 {
        return Err(invalid("expected 40 hex digits"));
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid("non-hex character"));
    }

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper {
        return Address::parse_checksummed(value, None).map_err(|_| invalid("checksum mismatch"));
    }

    value
        .parse::<Address>()
        .map_err(|e| invalid(&e.to_string()))
}
