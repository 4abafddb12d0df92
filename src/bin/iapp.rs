// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Enclave entry point.
//!
//! Reads the intent from requester secret #1 and the operator key from the
//! app-developer secret, runs the pipeline once, and writes `result.json` and
//! `computed.json` into `IEXEC_OUT`. Exits non-zero when the execution fails.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use hypersecret::blockchain::ChainError;
use hypersecret::config::{
    BridgeConfig, IEXEC_APP_DEVELOPER_SECRET_ENV, IEXEC_OUT_ENV, IEXEC_REQUESTER_SECRET_1_ENV,
};
use hypersecret::intent::{decode, Intent, IntentPayload};
use hypersecret::logging::{init_tracing, LogFormat};
use hypersecret::pipeline::artifact::DEFAULT_OUT_DIR;
use hypersecret::pipeline::{
    write_artifacts, ErrorKind, ExecutionError, ExecutionOutcome, FailureRecord, Pipeline,
    PipelineState,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());

    let out_dir = std::env::var(IEXEC_OUT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_OUT_DIR));

    let outcome = execute().await;
    let success = outcome.is_success();

    match write_artifacts(&out_dir, &outcome) {
        Ok(path) => info!(path = %path.display(), success, "Result written"),
        Err(e) => {
            error!(out_dir = %out_dir.display(), error = %e, "Failed to write result");
            return ExitCode::from(2);
        }
    }

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

async fn execute() -> ExecutionOutcome {
    let intent = match read_intent() {
        Ok(intent) => intent,
        Err(record) => return ExecutionOutcome::Failed(record),
    };

    let mut bridge = match BridgeConfig::from_env() {
        Ok(bridge) => bridge,
        Err(e) => return setup_failure(ErrorKind::Internal, &e.to_string()),
    };
    if let Ok(key) = std::env::var(IEXEC_APP_DEVELOPER_SECRET_ENV) {
        bridge = bridge.with_operator_key(key);
    }

    let chain = match bridge.source_client() {
        Ok(chain) => chain,
        Err(e) => return chain_failure(e),
    };
    if let Err(e) = chain.verify_network().await {
        return chain_failure(e);
    }
    let destination = match bridge.destination_client() {
        Ok(destination) => destination,
        Err(e) => {
            let message = e.to_string();
            return setup_failure(ExecutionError::from(e).kind(), &message);
        }
    };

    let pipeline = Pipeline::new(Arc::new(chain), Arc::new(destination), bridge.pipeline_config());
    let (progress, _progress_rx) = watch::channel(PipelineState::Pending);
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    info!(
        destination = %intent.destination(),
        amount = %intent.amount(),
        "Starting execution"
    );

    match pipeline.run(&intent, &progress, &cancel).await {
        Ok(proof) => ExecutionOutcome::Completed(proof),
        Err(failure) => ExecutionOutcome::Failed(failure.record()),
    }
}

fn read_intent() -> Result<Intent, FailureRecord> {
    let secret = std::env::var(IEXEC_REQUESTER_SECRET_1_ENV).map_err(|_| {
        FailureRecord::before_start(
            ErrorKind::Validation,
            &format!("{IEXEC_REQUESTER_SECRET_1_ENV} is not set"),
            Utc::now(),
        )
    })?;

    decode(&IntentPayload::from_secret(secret))
        .map_err(|e| FailureRecord::before_start(ErrorKind::Validation, &e.to_string(), Utc::now()))
}

fn setup_failure(kind: ErrorKind, message: &str) -> ExecutionOutcome {
    error!(kind = ?kind, error = %message, "Execution set-up failed");
    ExecutionOutcome::Failed(FailureRecord::before_start(kind, message, Utc::now()))
}

fn chain_failure(e: ChainError) -> ExecutionOutcome {
    let message = e.to_string();
    setup_failure(ExecutionError::from(e).kind(), &message)
}

/// The provider stops jobs with SIGTERM when they exceed their time limit.
async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                return;
            }
        }
    }
    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
    }

    warn!("Termination requested; cancelling execution");
    cancel.cancel();
}
