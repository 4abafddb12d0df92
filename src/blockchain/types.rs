// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Source-network types and constants.

use alloy::primitives::{address, Address, U256};

/// Source network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: String,
    /// Chain ID
    pub chain_id: u64,
    /// RPC endpoint URL
    pub rpc_url: String,
    /// Block explorer URL
    pub explorer_url: String,
}

impl NetworkConfig {
    /// Arbitrum Sepolia, where the vault and the bridge ingress live.
    pub fn arbitrum_sepolia() -> Self {
        Self {
            name: "Arbitrum Sepolia".to_string(),
            chain_id: ARB_SEPOLIA_CHAIN_ID,
            rpc_url: ARB_SEPOLIA_RPC.to_string(),
            explorer_url: "https://sepolia.arbiscan.io".to_string(),
        }
    }

    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }
}

/// Arbitrum Sepolia chain id.
pub const ARB_SEPOLIA_CHAIN_ID: u64 = 421614;

/// Public Arbitrum Sepolia RPC endpoint.
pub const ARB_SEPOLIA_RPC: &str = "https://sepolia-rollup.arbitrum.io/rpc";

/// USDC2 on Arbitrum Sepolia: the token accepted by the Hyperliquid bridge
/// (plain Circle USDC on mainnet). Its precision is
/// [`TOKEN_DECIMALS`](super::amount::TOKEN_DECIMALS), checked at start-up.
pub const USDC2_TOKEN_ADDRESS: Address = address!("1baAbB04529D43a73232B713C0FE471f7c7334d5");

/// Hyperliquid bridge ingress contract on Arbitrum Sepolia.
pub const HL_BRIDGE_ADDRESS: Address = address!("08cfc1B6b2dCF36A1480b99353A354AA8AC56f89");

/// Native gas stipend sent to every relay account: 0.001 ETH.
///
/// Sized for the relay account's own source-network transactions only.
pub const GAS_STIPEND_WEI: U256 = U256::from_limbs([1_000_000_000_000_000, 0, 0, 0]);

/// Confirmations required before a source-network step counts as final.
pub const REQUIRED_CONFIRMATIONS: u64 = 1;

/// Reference to a confirmed source-network transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRef {
    /// Transaction hash (0x-prefixed)
    pub tx_hash: String,
    /// Block number where the transaction was included
    pub block_number: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_stipend_is_one_thousandth_of_an_ether() {
        let one_ether = U256::from(10u64).pow(U256::from(18));
        assert_eq!(GAS_STIPEND_WEI * U256::from(1000), one_ether);
    }

    #[test]
    fn explorer_links_use_tx_path() {
        let network = NetworkConfig::arbitrum_sepolia();
        assert_eq!(
            network.tx_url("0xabc"),
            "https://sepolia.arbiscan.io/tx/0xabc"
        );
    }
}
