// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Command-line execution tracker for the fallback server.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hypersecret::blockchain::UsdcAmount;
use hypersecret::config::{
    APP_ADDRESS_ENV, FALLBACK_API_URL_ENV, REQUESTER_ADDRESS_ENV, TRACK_POLL_INTERVAL_SECS_ENV,
    VAULT_ADDRESS_ENV,
};
use hypersecret::enclave::fallback::{FallbackClient, DEFAULT_FALLBACK_URL};
use hypersecret::enclave::{submit_intent, ComputeTarget, ExecutionHandle};
use hypersecret::intent::{parse_account, Intent};
use hypersecret::logging::{init_tracing, LogFormat};
use hypersecret::tracker::{ExecutionTracker, TrackedState, TrackedStatus};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "hypersecret-track", about = "Submit and follow HyperSecret executions")]
struct Cli {
    /// Fallback server base URL.
    #[arg(long, env = FALLBACK_API_URL_ENV, default_value = DEFAULT_FALLBACK_URL)]
    api_url: String,

    /// Seconds between status polls.
    #[arg(long, env = TRACK_POLL_INTERVAL_SECS_ENV, default_value_t = 5)]
    interval_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow an execution until it completes or fails.
    Watch { execution_id: String },

    /// Store the intent as the requester's secret, start a job, then follow it.
    Submit {
        #[arg(long)]
        destination: String,
        #[arg(long)]
        amount: String,
        #[arg(long, env = VAULT_ADDRESS_ENV)]
        vault: String,
        /// Requester owning the intent secret slot.
        #[arg(long, env = REQUESTER_ADDRESS_ENV)]
        requester: String,
        #[arg(long, env = APP_ADDRESS_ENV, default_value = "hypersecret")]
        app: String,
        #[arg(long)]
        workerpool: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing(LogFormat::from_env());
    let cli = Cli::parse();

    let client = match FallbackClient::new(&cli.api_url) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let (client, handle) = match cli.command {
        Command::Watch { execution_id } => (client, ExecutionHandle::new(execution_id)),
        Command::Submit {
            destination,
            amount,
            vault,
            requester,
            app,
            workerpool,
        } => {
            let prepared = parse_account("requester", &requester).and_then(|requester| {
                let amount = UsdcAmount::parse(&amount)?;
                Ok((requester, Intent::new(&destination, amount, &vault)?))
            });
            let (requester, intent) = match prepared {
                Ok(prepared) => prepared,
                Err(e) => {
                    eprintln!("error: {e}");
                    return ExitCode::FAILURE;
                }
            };

            let client = client.with_requester(requester);
            let target = ComputeTarget { app, workerpool };
            match submit_intent(&client, &client, &target, &intent).await {
                Ok(submission) => {
                    println!("submitted {} ({:?})", submission.handle, submission.registration);
                    (client, submission.handle)
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    return ExitCode::FAILURE;
                }
            }
        }
    };

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let status = ExecutionTracker::new(Arc::new(client), handle)
        .with_interval(Duration::from_secs(cli.interval_secs.max(1)))
        .run(cancel, print_status)
        .await;

    match status.state {
        TrackedState::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn print_status(status: &TrackedStatus) {
    match status.state {
        TrackedState::Submitted | TrackedState::Active => {
            println!("{} ({})", status.state, status.raw_detail);
        }
        TrackedState::Completed => {
            println!("completed");
            if let Some(proof) = &status.proof_excerpt {
                println!("  destination: {}", proof.destination);
                println!("  amount:      {}", proof.amount);
                println!("  bridge tx:   {}", proof.bridge_tx_ref);
                if let Some(result) = &proof.destination_status {
                    println!("  transfer:    {result}");
                }
            }
        }
        TrackedState::Failed => {
            match status.failed_at {
                Some(step) => println!("failed at {step}"),
                None => println!("failed"),
            }
            if let Some(error) = &status.error {
                println!("  {error}");
            }
        }
    }
}
