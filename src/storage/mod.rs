// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Sealed Storage Module
//!
//! Persistent storage on a **Gramine encrypted mount**. Everything lives under
//! `/data`, which the manifest mounts as `type = "encrypted"`.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   executions/
//!     {execution_id}.json   # Proof or failure record
//!   audit/
//!     {date}/events.jsonl   # Daily audit logs
//! ```
//!
//! ## Important Notes
//!
//! - This module uses **normal filesystem I/O**
//! - Gramine handles all encryption/decryption transparently
//! - Intents are never written here

pub mod audit;
pub mod encrypted_fs;
pub mod executions;
pub mod paths;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use encrypted_fs::{write_json_atomic, EncryptedStorage, StorageError, StorageResult};
pub use executions::{ExecutionRepository, StoredExecution};
pub use paths::StoragePaths;
