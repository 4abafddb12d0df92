// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Source-network (Arbitrum Sepolia) integration.
//!
//! This module provides:
//! - Fixed-point token amounts
//! - Single-use relay account generation
//! - Vault redistribution, gas funding and bridge transfers

pub mod amount;
pub mod client;
pub mod erc20;
pub mod relay;
pub mod signing;
pub mod types;
pub mod vault;

pub use amount::{AmountError, UsdcAmount};
pub use client::{ChainError, SourceChain, SourceChainClient};
pub use relay::{RelayAccount, RelayError};
pub use types::*;
