// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Operator key loading.
//!
//! The operator (redistributor) key arrives as a hex string: through the
//! app-developer secret inside the enclave, or `TEE_PRIVATE_KEY` on the
//! fallback server. It funds relay gas and calls `redistribute`.

use alloy::signers::local::PrivateKeySigner;

use super::client::ChainError;

/// Parse a hex-encoded secp256k1 private key, with or without `0x`.
///
/// # Returns
/// * `Ok(PrivateKeySigner)` - A signer ready to sign transactions
/// * `Err(ChainError::InvalidPrivateKey)` - If the key is malformed
pub fn operator_signer(key_hex: &str) -> Result<PrivateKeySigner, ChainError> {
    let trimmed = key_hex.trim();
    let key = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    if key.len() != 64 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ChainError::InvalidPrivateKey(
            "expected 32 bytes of hex".to_string(),
        ));
    }

    // Never echo the key back in the error.
    key.parse::<PrivateKeySigner>()
        .map_err(|_| ChainError::InvalidPrivateKey("not a valid secp256k1 scalar".to_string()))
}
