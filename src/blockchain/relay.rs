// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-use relay accounts.
//!
//! Every execution gets a brand-new secp256k1 key drawn from the OS CSPRNG
//! inside the enclave. No constructor accepts a seed or a parent key, and no
//! relay key is ever derived from another one.
//!
//! The key never leaves enclave memory and is dropped with the execution.

use std::fmt;

use alloy::{network::EthereumWallet, primitives::Address, signers::local::PrivateKeySigner};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::rand_core::{OsRng, RngCore};
use k256::elliptic_curve::zeroize::Zeroize;

/// Errors that can occur while generating a relay account.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Entropy source failure: {0}")]
    Entropy(String),
}

/// A freshly generated account that relays funds for exactly one execution.
#[derive(Clone)]
pub struct RelayAccount {
    address: Address,
    signer: PrivateKeySigner,
}

impl RelayAccount {
    /// Generate a new relay account from the operating system's CSPRNG.
    pub fn generate() -> Result<Self, RelayError> {
        let signing_key = random_signing_key()?;
        let signer = PrivateKeySigner::from_signing_key(signing_key);

        Ok(Self {
            address: signer.address(),
            signer,
        })
    }

    /// Public address of the relay account.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Signer for typed actions and transactions.
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Wallet wrapper for a signing provider.
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl fmt::Debug for RelayAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayAccount")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Draw 32 bytes until they form a valid secp256k1 scalar.
///
/// Rejection happens with probability ~2^-128, so the loop runs once in
/// practice.
fn random_signing_key() -> Result<SigningKey, RelayError> {
    loop {
        let mut bytes = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| RelayError::Entropy(e.to_string()))?;

        let key = SigningKey::from_bytes(&bytes.into());
        bytes.zeroize();

        if let Ok(key) = key {
            return Ok(key);
        }
    }
}
