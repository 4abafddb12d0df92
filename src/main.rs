// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fallback HTTP server: runs the pipeline outside an enclave.

use std::sync::Arc;

use hypersecret::api::router;
use hypersecret::blockchain::SourceChainClient;
use hypersecret::config::{BridgeConfig, ServerConfig};
use hypersecret::destination::HyperliquidClient;
use hypersecret::logging::{init_tracing, LogFormat};
use hypersecret::pipeline::{IntentExecutor, Pipeline};
use hypersecret::state::AppState;
use hypersecret::storage::{EncryptedStorage, StoragePaths};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() {
    init_tracing(LogFormat::from_env());

    let server = ServerConfig::from_env().expect("Invalid server configuration");
    let bridge = BridgeConfig::from_env().expect("Invalid bridge configuration");
    let addr = server.bind_addr().expect("Failed to parse bind address");

    let shutdown = CancellationToken::new();
    let mut state = AppState::new(build_executor(&bridge).await)
        .with_default_vault(bridge.default_vault)
        .with_retention(server.execution_retention)
        .with_shutdown(shutdown.clone());

    let mut storage = EncryptedStorage::new(StoragePaths::new(&server.data_dir));
    match storage.initialize() {
        Ok(()) => state = state.with_storage(Arc::new(storage)),
        Err(e) => warn!(
            data_dir = %server.data_dir.display(),
            error = %e,
            "Sealed storage unavailable; outcomes will not be persisted"
        ),
    }

    let tasks = state.tasks.clone();
    tasks.spawn(state.executions.clone().sweep(shutdown.clone()));

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    info!(%addr, "HyperSecret fallback server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("HTTP server failed");

    tasks.close();
    info!(running = tasks.len(), "Waiting for executions to finish");
    tasks.wait().await;
    info!("Shutdown complete");
}

/// The pipeline over real networks, or `None` without an operator key.
async fn build_executor(bridge: &BridgeConfig) -> Option<Arc<dyn IntentExecutor>> {
    if !bridge.has_operator_key() {
        warn!("No operator key configured; /process-intent is disabled");
        return None;
    }

    let chain: SourceChainClient = match bridge.source_client() {
        Ok(chain) => chain,
        Err(e) => {
            warn!(error = %e, "Source chain client unavailable; /process-intent is disabled");
            return None;
        }
    };
    if let Err(e) = chain.verify_network().await {
        warn!(error = %e, "Source network check failed; /process-intent is disabled");
        return None;
    }

    let destination: HyperliquidClient = match bridge.destination_client() {
        Ok(destination) => destination,
        Err(e) => {
            warn!(error = %e, "Destination client unavailable; /process-intent is disabled");
            return None;
        }
    };

    info!(
        network = %chain.network().name,
        operator = %chain.operator_address(),
        destination_chain = %bridge.destination_chain,
        "Pipeline configured"
    );

    Some(Arc::new(Pipeline::new(
        Arc::new(chain),
        Arc::new(destination),
        bridge.pipeline_config(),
    )))
}

/// Resolve on Ctrl-C or SIGTERM and cancel running executions.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
