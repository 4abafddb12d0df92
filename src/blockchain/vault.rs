// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Privacy vault contract interface.
//!
//! The vault's accounting is owned by the contract; the pipeline only calls
//! `redistribute` (gated to the enclave's redistributor key) and reads
//! `getBalance`. `deposit`, `deposits` and `emergencyWithdraw` are the
//! depositor-side surface and are listed so the client can read them.

use alloy::sol;

use super::client::ChainError;

sol! {
    #[sol(rpc)]
    interface IPrivacyVault {
        function deposit(uint256 amount) external;
        function redistribute(address[] recipients, uint256[] amounts) external;
        function emergencyWithdraw() external;
        function deposits(address depositor) external view returns (uint256);
        function getBalance() external view returns (uint256);
    }
}

/// Revert-reason fragments that mean the caller lacks the redistributor role.
const AUTHORIZATION_MARKERS: [&str; 5] = [
    "not authorized",
    "unauthorized",
    "only redistributor",
    "only tee",
    "accesscontrol",
];

/// Revert-reason fragments that mean the vault cannot cover the amounts.
const BALANCE_MARKERS: [&str; 3] = [
    "insufficient",
    "exceeds balance",
    "transfer amount exceeds",
];

/// Map a decoded `redistribute` revert reason onto the error taxonomy.
pub fn classify_redistribute_revert(reason: &str) -> ChainError {
    let lower = reason.to_ascii_lowercase();

    if AUTHORIZATION_MARKERS.iter().any(|m| lower.contains(m)) {
        ChainError::Authorization(reason.to_string())
    } else if BALANCE_MARKERS.iter().any(|m| lower.contains(m)) {
        ChainError::InsufficientVaultBalance(reason.to_string())
    } else {
        ChainError::Rejected(reason.to_string())
    }
}

/// Best-effort human-readable reason from a contract call error.
///
/// Prefers the ABI-decoded `Error(string)` payload and falls back to the
/// transport's message.
pub fn revert_reason(err: &alloy::contract::Error) -> String {
    err.as_revert_data()
        .and_then(|data| alloy::sol_types::decode_revert_reason(data.as_ref()))
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{hex, Bytes};
    use alloy::rpc::json_rpc::ErrorPayload;
    use alloy::sol_types::SolError;
    use alloy::transports::TransportError;

    use super::*;

    alloy::sol! {
        #[derive(Debug)]
        error Error(string message);
    }

    fn revert_with_message(message: &str) -> alloy::contract::Error {
        let data = Bytes::from(
            Error {
                message: message.into(),
            }
            .abi_encode(),
        );
        let raw = serde_json::value::to_raw_value(&hex::encode_prefixed(&data)).unwrap();
        let payload = ErrorPayload {
            code: 3,
            message: "execution reverted".into(),
            data: Some(raw),
        };
        alloy::contract::Error::TransportError(TransportError::ErrorResp(payload))
    }

    #[test]
    fn authorization_reverts_are_classified() {
        assert!(matches!(
            classify_redistribute_revert("Not authorized: caller is not the TEE"),
            ChainError::Authorization(_)
        ));
    }

    #[test]
    fn balance_reverts_are_classified() {
        assert!(matches!(
            classify_redistribute_revert("Insufficient vault balance"),
            ChainError::InsufficientVaultBalance(_)
        ));
    }

    #[test]
    fn unknown_reverts_are_rejections() {
        assert!(matches!(
            classify_redistribute_revert("Length mismatch"),
            ChainError::Rejected(_)
        ));
    }

    #[test]
    fn revert_reason_decodes_error_string() {
        let err = revert_with_message("Insufficient vault balance");
        assert_eq!(revert_reason(&err), "Insufficient vault balance");
    }

    #[test]
    fn revert_reason_falls_back_to_transport_message() {
        let err = alloy::contract::Error::TransportError(TransportError::local_usage_str(
            "connection refused",
        ));
        assert!(revert_reason(&err).contains("connection refused"));
    }
}
