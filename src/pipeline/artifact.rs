// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Result artifacts for the enclave provider.

use std::path::{Path, PathBuf};

use serde_json::json;

use super::ExecutionOutcome;
use crate::storage::{write_json_atomic, StorageResult};

/// Proof or failure record.
pub const RESULT_FILE: &str = "result.json";

/// Provider manifest pointing at the deterministic output.
pub const COMPUTED_FILE: &str = "computed.json";

/// Default output directory when `IEXEC_OUT` is unset.
pub const DEFAULT_OUT_DIR: &str = "/tmp/iexec_out";

/// Write `result.json` and `computed.json` into `out_dir`.
///
/// Returns the path of the result file.
pub fn write_artifacts(out_dir: &Path, outcome: &ExecutionOutcome) -> StorageResult<PathBuf> {
    let result_path = out_dir.join(RESULT_FILE);
    write_json_atomic(&result_path, outcome)?;

    let computed = json!({
        "deterministic-output-path": result_path.to_string_lossy(),
    });
    write_json_atomic(&out_dir.join(COMPUTED_FILE), &computed)?;

    Ok(result_path)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::pipeline::{ErrorKind, FailureRecord, PipelineStep};

    fn failure() -> ExecutionOutcome {
        ExecutionOutcome::Failed(FailureRecord {
            success: false,
            failed_at: PipelineStep::Credited,
            error_kind: ErrorKind::BridgeTimeout,
            error: "Bridge credit not observed after 30 attempts".to_string(),
            completed_steps: vec![
                PipelineStep::RelayGenerated,
                PipelineStep::Redistributed,
                PipelineStep::Funded,
                PipelineStep::Bridged,
            ],
            relay_account: None,
            redistribute_tx_ref: Some("0x01".to_string()),
            funding_tx_ref: Some("0x02".to_string()),
            bridge_tx_ref: Some("0x03".to_string()),
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn writes_result_and_manifest() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("iexec_out");

        let path = write_artifacts(&out, &failure()).unwrap();
        assert_eq!(path, out.join(RESULT_FILE));

        let result: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(result["failedAt"], "Credited");
        assert_eq!(result["errorKind"], "BridgeTimeoutError");

        let computed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(COMPUTED_FILE)).unwrap())
                .unwrap();
        assert_eq!(
            computed["deterministic-output-path"],
            path.to_string_lossy().as_ref()
        );
    }

    #[test]
    fn rewriting_replaces_previous_result() {
        let temp = TempDir::new().unwrap();
        write_artifacts(temp.path(), &failure()).unwrap();
        write_artifacts(temp.path(), &failure()).unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
        assert_eq!(entries.len(), 2);
    }
}
