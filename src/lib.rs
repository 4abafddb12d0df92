// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HyperSecret - Anonymous Arbitrum Sepolia → Hyperliquid bridge
//!
//! Funds leave a custodial vault for a freshly generated, single-use relay
//! account, cross the Hyperliquid bridge from there, and are forwarded to the
//! destination account. The execution runs inside a TEE, so nothing outside
//! the enclave links the depositor to the destination.
//!
//! ## Modules
//!
//! - `intent` - Validated transfer intents and their secret payload codec
//! - `blockchain` - Source-network (Arbitrum Sepolia) adapter
//! - `destination` - Hyperliquid queries, credit waiting and signed transfers
//! - `pipeline` - Six-step orchestrator, proofs and result artifacts
//! - `enclave` - Job provider interface and the fallback HTTP client
//! - `tracker` - Client-side execution status state machine
//! - `api` - Fallback HTTP surface (Axum)
//! - `secrets` - Requester secret slots on the fallback server
//! - `storage` - Sealed storage (Gramine encrypted FS)

pub mod api;
pub mod blockchain;
pub mod config;
pub mod destination;
pub mod enclave;
pub mod error;
pub mod executions;
pub mod intent;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod secrets;
pub mod state;
pub mod storage;
pub mod tracker;
