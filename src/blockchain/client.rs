// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Source-network (Arbitrum) client: the three state-changing pipeline calls.
//!
//! Each call is signed, submitted, and then awaited until it has
//! [`REQUIRED_CONFIRMATIONS`] confirmations. A receipt with a failed status
//! is reported exactly like a rejected submission.

use std::time::Duration;

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use tracing::{debug, info};

use super::amount::TOKEN_DECIMALS;
use super::erc20::Erc20Contract;
use super::relay::RelayAccount;
use super::types::{NetworkConfig, TxRef, REQUIRED_CONFIRMATIONS};
use super::vault::{classify_redistribute_revert, revert_reason, IPrivacyVault};

/// Upper bound on waiting for a single confirmation.
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(180);

/// The source-network operations the pipeline depends on.
#[async_trait]
pub trait SourceChain: Send + Sync {
    /// Move `amounts[i]` raw units from the vault to `recipients[i]`.
    async fn redistribute(
        &self,
        vault: Address,
        recipients: &[Address],
        amounts: &[U256],
    ) -> Result<TxRef, ChainError>;

    /// Send the fixed native-gas stipend from the operator to the relay.
    async fn fund_gas(&self, relay: Address, stipend: U256) -> Result<TxRef, ChainError>;

    /// Transfer `amount` raw token units from the relay account to `to`.
    async fn transfer_token(
        &self,
        relay: &RelayAccount,
        to: Address,
        amount: U256,
    ) -> Result<TxRef, ChainError>;
}

/// Arbitrum client signing with the enclave operator key.
pub struct SourceChainClient {
    network: NetworkConfig,
    rpc_url: url::Url,
    token: Address,
    operator: DynProvider,
    operator_address: Address,
}

impl SourceChainClient {
    /// Create a client for `network`, moving `token`, signing with `operator`.
    pub fn new(
        network: NetworkConfig,
        token: Address,
        operator: PrivateKeySigner,
    ) -> Result<Self, ChainError> {
        let rpc_url: url::Url = network
            .rpc_url
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;

        let operator_address = operator.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(operator))
            .connect_http(rpc_url.clone())
            .erased();

        Ok(Self {
            network,
            rpc_url,
            token,
            operator: provider,
            operator_address,
        })
    }

    /// Address of the operator (redistributor) account.
    pub fn operator_address(&self) -> Address {
        self.operator_address
    }

    /// Get the network configuration.
    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Start-up check: the RPC endpoint serves the configured chain and the
    /// token has the fixed 6-decimal precision.
    pub async fn verify_network(&self) -> Result<(), ChainError> {
        let chain_id = self
            .operator
            .get_chain_id()
            .await
            .map_err(|e| ChainError::Rpc(format!("Failed to read chain id: {e}")))?;
        if chain_id != self.network.chain_id {
            return Err(ChainError::WrongChain {
                expected: self.network.chain_id,
                actual: chain_id,
            });
        }

        let decimals = Erc20Contract::new(&self.operator, self.token)
            .decimals()
            .await?;
        if decimals != TOKEN_DECIMALS {
            return Err(ChainError::UnsupportedPrecision(decimals));
        }

        debug!(chain_id, token = %self.token, "Source network verified");
        Ok(())
    }

    /// Wait for the configured confirmations and check the receipt status.
    async fn confirm(
        &self,
        pending: PendingTransactionBuilder<Ethereum>,
    ) -> Result<TxRef, ChainError> {
        let tx_hash = format!("{:#x}", pending.tx_hash());
        debug!(tx_hash = %tx_hash, "Waiting for confirmation");

        let receipt = pending
            .with_required_confirmations(REQUIRED_CONFIRMATIONS)
            .with_timeout(Some(CONFIRMATION_TIMEOUT))
            .get_receipt()
            .await
            .map_err(|e| ChainError::Rpc(format!("Failed to confirm {tx_hash}: {e}")))?;

        self.settle(tx_hash, &receipt)
    }

    /// A mined transaction counts only with a successful status.
    fn settle(&self, tx_hash: String, receipt: &TransactionReceipt) -> Result<TxRef, ChainError> {
        if !receipt.status() {
            return Err(ChainError::Reverted { tx_hash });
        }

        let block_number = receipt.block_number.unwrap_or(0);
        info!(
            tx_hash = %tx_hash,
            block_number,
            explorer = %self.network.tx_url(&tx_hash),
            "Transaction confirmed"
        );

        Ok(TxRef {
            tx_hash,
            block_number,
        })
    }
}

#[async_trait]
impl SourceChain for SourceChainClient {
    async fn redistribute(
        &self,
        vault: Address,
        recipients: &[Address],
        amounts: &[U256],
    ) -> Result<TxRef, ChainError> {
        let contract = IPrivacyVault::new(vault, self.operator.clone());

        let required = amounts.iter().fold(U256::ZERO, |acc, a| acc.saturating_add(*a));
        let available = contract
            .getBalance()
            .call()
            .await
            .map_err(|e| ChainError::Rpc(format!("Failed to read vault balance: {e}")))?;
        if available < required {
            return Err(ChainError::InsufficientVaultBalance(format!(
                "vault holds {available}, redistribution needs {required}"
            )));
        }

        let call = contract.redistribute(recipients.to_vec(), amounts.to_vec());

        // Simulated reverts carry the decoded reason.
        if let Err(e) = call.call().await {
            return Err(classify_redistribute_revert(&revert_reason(&e)));
        }

        let pending = call
            .send()
            .await
            .map_err(|e| classify_redistribute_revert(&revert_reason(&e)))?;

        self.confirm(pending).await
    }

    async fn fund_gas(&self, relay: Address, stipend: U256) -> Result<TxRef, ChainError> {
        let tx = TransactionRequest::default().to(relay).value(stipend);

        let pending = self
            .operator
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::Rejected(format!("Failed to send: {e}")))?;

        self.confirm(pending).await
    }

    async fn transfer_token(
        &self,
        relay: &RelayAccount,
        to: Address,
        amount: U256,
    ) -> Result<TxRef, ChainError> {
        let provider = ProviderBuilder::new()
            .wallet(relay.wallet())
            .connect_http(self.rpc_url.clone());
        let token = Erc20Contract::new(&provider, self.token);

        let balance = token.balance_of(relay.address()).await?;
        if balance < amount {
            return Err(ChainError::Transfer(format!(
                "relay holds {balance}, transfer needs {amount}"
            )));
        }

        let pending = token
            .instance()
            .transfer(to, amount)
            .send()
            .await
            .map_err(|e| ChainError::Rejected(revert_reason(&e)))?;

        self.confirm(pending).await
    }
}

/// Errors that can occur during source-network operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract error: {0}")]
    Contract(String),

    #[error("Token uses {0} decimals, expected {TOKEN_DECIMALS}")]
    UnsupportedPrecision(u8),

    #[error("RPC serves chain {actual}, expected {expected}")]
    WrongChain { expected: u64, actual: u64 },

    #[error("Caller lacks the redistribution role: {0}")]
    Authorization(String),

    #[error("Insufficient vault balance: {0}")]
    InsufficientVaultBalance(String),

    #[error("Transfer precondition failed: {0}")]
    Transfer(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    const TOKEN: Address = address!("1baAbB04529D43a73232B713C0FE471f7c7334d5");
    const VAULT: Address = address!("0000000000000000000000000000000000000a11");
    const RECIPIENT: Address = address!("00000000000000000000000000000000000000b0");
    const TX_HASH: &str = "0x8a3b7c72e8d1f5b0a0a9b35a3d1b1f2c4f9e6b7d8c9a0b1c2d3e4f5a6b7c8d9e";

    fn client(server: &MockServer) -> SourceChainClient {
        let network = NetworkConfig {
            rpc_url: server.base_url(),
            ..NetworkConfig::arbitrum_sepolia()
        };
        SourceChainClient::new(network, TOKEN, PrivateKeySigner::random()).unwrap()
    }

    fn word(value: u64) -> String {
        format!("0x{value:064x}")
    }

    fn rpc_result(result: serde_json::Value) -> serde_json::Value {
        json!({ "jsonrpc": "2.0", "id": 0, "result": result })
    }

    fn receipt(status: &str) -> serde_json::Value {
        json!({
            "transactionHash": TX_HASH,
            "transactionIndex": "0x0",
            "blockHash": "0x1f2e3d4c5b6a79880716253443526170f1e2d3c4b5a69788a9b0c1d2e3f40516",
            "blockNumber": "0x10",
            "from": "0x00000000000000000000000000000000000000c0",
            "to": "0x1baabb04529d43a73232b713c0fe471f7c7334d5",
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x1",
            "contractAddress": null,
            "logs": [],
            "logsBloom": format!("0x{}", "0".repeat(512)),
            "status": status,
            "type": "0x2"
        })
    }

    #[tokio::test]
    async fn insufficient_vault_balance_stops_before_sending() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("eth_call").body_contains("12065fe0");
                then.status(200).json_body(rpc_result(json!(word(1))));
            })
            .await;
        let send = server
            .mock_async(|when, then| {
                when.method(POST).body_contains("eth_sendRawTransaction");
                then.status(200).json_body(rpc_result(json!(TX_HASH)));
            })
            .await;

        let err = client(&server)
            .redistribute(VAULT, &[RECIPIENT], &[U256::from(10u64)])
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::InsufficientVaultBalance(_)), "{err}");
        send.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn relay_without_token_balance_is_a_transfer_failure() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("eth_call").body_contains("70a08231");
                then.status(200).json_body(rpc_result(json!(word(0))));
            })
            .await;
        let send = server
            .mock_async(|when, then| {
                when.method(POST).body_contains("eth_sendRawTransaction");
                then.status(200).json_body(rpc_result(json!(TX_HASH)));
            })
            .await;

        let relay = RelayAccount::generate().unwrap();
        let err = client(&server)
            .transfer_token(&relay, RECIPIENT, U256::from(5_000_000u64))
            .await
            .unwrap_err();

        assert!(matches!(err, ChainError::Transfer(_)), "{err}");
        send.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn verify_network_rejects_other_chains() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("eth_chainId");
                then.status(200).json_body(rpc_result(json!("0x1")));
            })
            .await;
        let decimals = server
            .mock_async(|when, then| {
                when.method(POST).body_contains("313ce567");
                then.status(200).json_body(rpc_result(json!(word(6))));
            })
            .await;

        let err = client(&server).verify_network().await.unwrap_err();

        assert!(
            matches!(
                err,
                ChainError::WrongChain {
                    expected: 421614,
                    actual: 1
                }
            ),
            "{err}"
        );
        decimals.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn verify_network_rejects_non_six_decimal_tokens() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("eth_chainId");
                then.status(200).json_body(rpc_result(json!("0x66eee")));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("313ce567");
                then.status(200).json_body(rpc_result(json!(word(18))));
            })
            .await;

        let err = client(&server).verify_network().await.unwrap_err();

        assert!(matches!(err, ChainError::UnsupportedPrecision(18)), "{err}");
    }

    #[tokio::test]
    async fn verify_network_accepts_usdc_on_arbitrum_sepolia() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("eth_chainId");
                then.status(200).json_body(rpc_result(json!("0x66eee")));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("313ce567");
                then.status(200).json_body(rpc_result(json!(word(6))));
            })
            .await;

        client(&server).verify_network().await.unwrap();
    }

    #[tokio::test]
    async fn reverted_receipt_is_reported_with_its_hash() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("eth_getTransactionReceipt");
                then.status(200).json_body(rpc_result(receipt("0x0")));
            })
            .await;
        let client = client(&server);
        let hash = TX_HASH.parse().unwrap();

        let receipt = client
            .operator
            .get_transaction_receipt(hash)
            .await
            .unwrap()
            .unwrap();
        let err = client.settle(TX_HASH.to_string(), &receipt).unwrap_err();

        match err {
            ChainError::Reverted { tx_hash } => assert_eq!(tx_hash, TX_HASH),
            other => panic!("expected revert, got {other}"),
        }
    }

    #[tokio::test]
    async fn successful_receipt_yields_block_reference() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).body_contains("eth_getTransactionReceipt");
                then.status(200).json_body(rpc_result(receipt("0x1")));
            })
            .await;
        let client = client(&server);
        let hash = TX_HASH.parse().unwrap();

        let receipt = client
            .operator
            .get_transaction_receipt(hash)
            .await
            .unwrap()
            .unwrap();
        let tx = client.settle(TX_HASH.to_string(), &receipt).unwrap();

        assert_eq!(tx.tx_hash, TX_HASH);
        assert_eq!(tx.block_number, 16);
    }
}
