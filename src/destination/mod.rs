// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Destination-network (Hyperliquid) integration.

pub mod client;
pub mod credit;
pub mod signing;

pub use client::{DestinationError, DestinationLedger, ExchangeResponse, HyperliquidClient};
pub use credit::{CreditWaiter, Credited};
pub use signing::{sign_usd_send, DestinationChain, SignedUsdSend};
