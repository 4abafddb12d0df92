// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ERC-20 token contract interactions.

use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    sol,
};

use super::client::ChainError;

// Define the ERC-20 interface using alloy's sol! macro
sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// ERC-20 contract wrapper.
pub struct Erc20Contract<P> {
    contract: IERC20::IERC20Instance<P>,
}

impl<P: Provider + Clone> Erc20Contract<P> {
    /// Create a new ERC-20 contract instance.
    pub fn new(provider: &P, address: Address) -> Self {
        Self {
            contract: IERC20::new(address, provider.clone()),
        }
    }

    /// Get the token decimals.
    pub async fn decimals(&self) -> Result<u8, ChainError> {
        self.contract
            .decimals()
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Raw balance of an address in the token's smallest unit.
    pub async fn balance_of(&self, account: Address) -> Result<U256, ChainError> {
        self.contract
            .balanceOf(account)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))
    }

    /// Underlying contract instance, for building `transfer` calls.
    pub fn instance(&self) -> &IERC20::IERC20Instance<P> {
        &self.contract
    }
}
