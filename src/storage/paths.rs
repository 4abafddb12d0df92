// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the sealed storage layout.

use std::path::{Path, PathBuf};

/// Base directory for all sealed persistent storage.
/// This MUST be mounted as `type = "encrypted"` in the Gramine manifest.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities for the sealed filesystem.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all sealed data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Execution Paths ==========

    /// Directory containing terminal execution outcomes.
    pub fn executions_dir(&self) -> PathBuf {
        self.root.join("executions")
    }

    /// Path to one execution's proof or failure record.
    pub fn execution(&self, execution_id: &str) -> PathBuf {
        self.executions_dir().join(format!("{execution_id}.json"))
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn execution_paths_are_correct() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(
            paths.executions_dir(),
            PathBuf::from("/tmp/test-data/executions")
        );
        assert_eq!(
            paths.execution("3f0c"),
            PathBuf::from("/tmp/test-data/executions/3f0c.json")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-10-14"),
            PathBuf::from("/data/audit/2026-10-14/events.jsonl")
        );
    }
}
