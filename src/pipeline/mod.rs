// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The anonymization pipeline.
//!
//! Six strictly ordered steps, each awaited to completion before the next:
//!
//! ```text
//! RelayGenerated → Redistributed → Funded → Bridged → Credited → DeliveredToDestination
//! ```
//!
//! Any error is fatal. Nothing is retried and nothing is rolled back; a
//! failure after `Redistributed` leaves the funds in the relay account, whose
//! address is kept in the failure record.

pub mod artifact;
pub mod proof;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::blockchain::{
    ChainError, RelayAccount, RelayError, SourceChain, GAS_STIPEND_WEI, HL_BRIDGE_ADDRESS,
};
use crate::destination::{
    sign_usd_send, CreditWaiter, DestinationChain, DestinationError, DestinationLedger,
};
use crate::error::excerpt;
use crate::intent::{Intent, IntentError};

pub use artifact::{write_artifacts, COMPUTED_FILE, RESULT_FILE};
pub use proof::{ExecutionOutcome, ExecutionProof, FailureRecord, ProofBuilder, ProofOrderError};

/// Pipeline steps in execution order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum PipelineStep {
    RelayGenerated,
    Redistributed,
    Funded,
    Bridged,
    Credited,
    DeliveredToDestination,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 6] = [
        Self::RelayGenerated,
        Self::Redistributed,
        Self::Funded,
        Self::Bridged,
        Self::Credited,
        Self::DeliveredToDestination,
    ];

    /// 1-based position.
    pub fn ordinal(&self) -> u8 {
        match self {
            Self::RelayGenerated => 1,
            Self::Redistributed => 2,
            Self::Funded => 3,
            Self::Bridged => 4,
            Self::Credited => 5,
            Self::DeliveredToDestination => 6,
        }
    }

    pub fn next(&self) -> Option<Self> {
        match self {
            Self::RelayGenerated => Some(Self::Redistributed),
            Self::Redistributed => Some(Self::Funded),
            Self::Funded => Some(Self::Bridged),
            Self::Bridged => Some(Self::Credited),
            Self::Credited => Some(Self::DeliveredToDestination),
            Self::DeliveredToDestination => None,
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Observable pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Pending,
    /// The given step completed; the next one is in flight.
    Reached(PipelineStep),
    Completed,
    Failed { at: PipelineStep },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// Error classes visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum ErrorKind {
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "AuthorizationError")]
    Authorization,
    #[serde(rename = "InsufficientVaultBalanceError")]
    InsufficientVaultBalance,
    #[serde(rename = "TransferError")]
    Transfer,
    #[serde(rename = "TransactionRejected")]
    TransactionRejected,
    #[serde(rename = "BridgeTimeoutError")]
    BridgeTimeout,
    #[serde(rename = "DestinationRejectedError")]
    DestinationRejected,
    #[serde(rename = "TransientQueryError")]
    TransientQuery,
    #[serde(rename = "EntropyError")]
    Entropy,
    #[serde(rename = "Cancelled")]
    Cancelled,
    #[serde(rename = "InternalError")]
    Internal,
}

/// Any error that ends an execution.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Intent(#[from] IntentError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Destination(#[from] DestinationError),

    #[error(transparent)]
    Proof(#[from] ProofOrderError),

    #[error("Execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Intent(_) => ErrorKind::Validation,
            Self::Relay(_) => ErrorKind::Entropy,
            Self::Chain(e) => match e {
                ChainError::Authorization(_) => ErrorKind::Authorization,
                ChainError::InsufficientVaultBalance(_) => ErrorKind::InsufficientVaultBalance,
                ChainError::Transfer(_) => ErrorKind::Transfer,
                ChainError::Rejected(_) | ChainError::Reverted { .. } => {
                    ErrorKind::TransactionRejected
                }
                ChainError::InvalidRpcUrl(_)
                | ChainError::InvalidPrivateKey(_)
                | ChainError::Rpc(_)
                | ChainError::Contract(_)
                | ChainError::UnsupportedPrecision(_)
                | ChainError::WrongChain { .. } => ErrorKind::Internal,
            },
            Self::Destination(e) => match e {
                DestinationError::Transient(_) => ErrorKind::TransientQuery,
                DestinationError::Rejected(_) => ErrorKind::DestinationRejected,
                DestinationError::BridgeTimeout { .. } => ErrorKind::BridgeTimeout,
                DestinationError::Cancelled => ErrorKind::Cancelled,
                DestinationError::Submission(_)
                | DestinationError::Signing(_)
                | DestinationError::InvalidResponse(_) => ErrorKind::Internal,
            },
            Self::Proof(_) => ErrorKind::Internal,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// A failed execution: the step that was being attempted, the cause, and
/// everything recorded before it.
#[derive(Debug, thiserror::Error)]
#[error("Execution failed at {failed_at}: {error}")]
pub struct PipelineFailure {
    pub failed_at: PipelineStep,
    #[source]
    pub error: ExecutionError,
    pub partial: ProofBuilder,
}

impl PipelineFailure {
    pub fn record(&self) -> FailureRecord {
        FailureRecord::from_failure(self, Utc::now())
    }
}

/// Fixed parameters of a pipeline deployment.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bridge ingress the relay transfers to.
    pub bridge: Address,
    /// Native gas sent to each relay account.
    pub gas_stipend: U256,
    pub destination_chain: DestinationChain,
    pub credit: CreditWaiter,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bridge: HL_BRIDGE_ADDRESS,
            gas_stipend: GAS_STIPEND_WEI,
            destination_chain: DestinationChain::Testnet,
            credit: CreditWaiter::default(),
        }
    }
}

/// Anything that can run an intent to a terminal state.
#[async_trait]
pub trait IntentExecutor: Send + Sync {
    async fn execute(
        &self,
        intent: Intent,
        progress: watch::Sender<PipelineState>,
        cancel: CancellationToken,
    ) -> Result<ExecutionProof, PipelineFailure>;
}

/// The orchestrator over a source chain and a destination ledger.
pub struct Pipeline<C: ?Sized, D: ?Sized> {
    chain: Arc<C>,
    destination: Arc<D>,
    config: PipelineConfig,
}

impl<C, D> Pipeline<C, D>
where
    C: SourceChain + ?Sized,
    D: DestinationLedger + ?Sized,
{
    pub fn new(chain: Arc<C>, destination: Arc<D>, config: PipelineConfig) -> Self {
        Self {
            chain,
            destination,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every step for `intent`, publishing progress on `progress`.
    pub async fn run(
        &self,
        intent: &Intent,
        progress: &watch::Sender<PipelineState>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionProof, PipelineFailure> {
        let mut proof = ProofBuilder::new(intent.destination(), intent.amount());
        let mut attempting = PipelineStep::RelayGenerated;
        progress.send_replace(PipelineState::Pending);

        match self
            .run_steps(intent, &mut proof, &mut attempting, progress, cancel)
            .await
        {
            Ok(sealed) => {
                progress.send_replace(PipelineState::Completed);
                info!(
                    relay = %sealed.relay_account(),
                    digest = %sealed.digest(),
                    "Execution completed"
                );
                Ok(sealed)
            }
            Err(error) => {
                progress.send_replace(PipelineState::Failed { at: attempting });
                error!(
                    failed_at = %attempting,
                    kind = ?error.kind(),
                    error = %excerpt(&error.to_string()),
                    "Execution failed"
                );
                Err(PipelineFailure {
                    failed_at: attempting,
                    error,
                    partial: proof,
                })
            }
        }
    }

    async fn run_steps(
        &self,
        intent: &Intent,
        proof: &mut ProofBuilder,
        attempting: &mut PipelineStep,
        progress: &watch::Sender<PipelineState>,
        cancel: &CancellationToken,
    ) -> Result<ExecutionProof, ExecutionError> {
        let amount_raw = intent.amount().to_u256();

        *attempting = PipelineStep::RelayGenerated;
        ensure_not_cancelled(cancel)?;
        let relay = RelayAccount::generate()?;
        proof.relay_generated(relay.address())?;
        reached(progress, PipelineStep::RelayGenerated);
        info!(relay = %relay.address(), "[1/6] Relay account generated");

        *attempting = PipelineStep::Redistributed;
        let tx = until_cancelled(
            cancel,
            self.chain.redistribute(intent.vault(), &[relay.address()], &[amount_raw]),
        )
        .await?;
        info!(tx_hash = %tx.tx_hash, block = tx.block_number, "[2/6] Vault redistributed");
        proof.redistributed(tx)?;
        reached(progress, PipelineStep::Redistributed);

        *attempting = PipelineStep::Funded;
        let tx = until_cancelled(
            cancel,
            self.chain.fund_gas(relay.address(), self.config.gas_stipend),
        )
        .await?;
        info!(tx_hash = %tx.tx_hash, "[3/6] Relay gas funded");
        proof.funded(tx)?;
        reached(progress, PipelineStep::Funded);

        *attempting = PipelineStep::Bridged;
        let tx = until_cancelled(
            cancel,
            self.chain.transfer_token(&relay, self.config.bridge, amount_raw),
        )
        .await?;
        info!(tx_hash = %tx.tx_hash, block = tx.block_number, "[4/6] Bridge transfer confirmed");
        proof.bridged(tx)?;
        reached(progress, PipelineStep::Bridged);

        *attempting = PipelineStep::Credited;
        let credit = self
            .config
            .credit
            .wait(&*self.destination, relay.address(), intent.amount(), cancel)
            .await?;
        info!(
            attempts = credit.attempts,
            balance = %credit.balance,
            "[5/6] Bridge credit observed"
        );
        proof.credited(credit)?;
        reached(progress, PipelineStep::Credited);

        *attempting = PipelineStep::DeliveredToDestination;
        ensure_not_cancelled(cancel)?;
        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let request = sign_usd_send(
            relay.signer(),
            self.config.destination_chain,
            intent.destination(),
            intent.amount(),
            now_ms,
        )?;
        let response =
            until_cancelled(cancel, self.destination.submit_usd_send(&request)).await?;
        info!(status = %response.status, "[6/6] Destination transfer accepted");
        proof.delivered(response)?;
        reached(progress, PipelineStep::DeliveredToDestination);

        Ok(proof.finish(Utc::now())?)
    }
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<(), ExecutionError> {
    if cancel.is_cancelled() {
        return Err(ExecutionError::Cancelled);
    }
    Ok(())
}

/// Run one side-effecting call, abandoning it when `cancel` fires.
///
/// An abandoned transaction may still be mined; the failure names the step
/// and keeps the relay address.
async fn until_cancelled<T, E>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, ExecutionError>
where
    ExecutionError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ExecutionError::Cancelled),
        result = call => Ok(result?),
    }
}

fn reached(progress: &watch::Sender<PipelineState>, step: PipelineStep) {
    progress.send_replace(PipelineState::Reached(step));
}

#[async_trait]
impl<C, D> IntentExecutor for Pipeline<C, D>
where
    C: SourceChain + ?Sized + 'static,
    D: DestinationLedger + ?Sized + 'static,
{
    async fn execute(
        &self,
        intent: Intent,
        progress: watch::Sender<PipelineState>,
        cancel: CancellationToken,
    ) -> Result<ExecutionProof, PipelineFailure> {
        self.run(&intent, &progress, &cancel).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::blockchain::{TxRef, UsdcAmount};
    use crate::destination::{ExchangeResponse, SignedUsdSend};

    /// Source chain double with per-operation call counters.
    pub(crate) struct MockChain {
        pub redistribute_calls: AtomicU32,
        pub fund_calls: AtomicU32,
        pub transfer_calls: AtomicU32,
        pub redistribute_result: Mutex<Option<ChainError>>,
        pub transfer_result: Mutex<Option<ChainError>>,
        pub recipients: Mutex<Vec<Address>>,
        counter: AtomicU32,
    }

    impl Default for MockChain {
        fn default() -> Self {
            Self {
                redistribute_calls: AtomicU32::new(0),
                fund_calls: AtomicU32::new(0),
                transfer_calls: AtomicU32::new(0),
                redistribute_result: Mutex::new(None),
                transfer_result: Mutex::new(None),
                recipients: Mutex::new(Vec::new()),
                counter: AtomicU32::new(0),
            }
        }
    }

    impl MockChain {
        pub(crate) fn failing_redistribute(error: ChainError) -> Self {
            let chain = Self::default();
            *chain.redistribute_result.lock().unwrap() = Some(error);
            chain
        }

        fn next_tx(&self) -> TxRef {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            TxRef {
                tx_hash: format!("0x{n:064x}"),
                block_number: u64::from(n),
            }
        }

        pub(crate) fn later_calls(&self) -> u32 {
            self.fund_calls.load(Ordering::SeqCst) + self.transfer_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SourceChain for MockChain {
        async fn redistribute(
            &self,
            _vault: Address,
            recipients: &[Address],
            _amounts: &[U256],
        ) -> Result<TxRef, ChainError> {
            self.redistribute_calls.fetch_add(1, Ordering::SeqCst);
            self.recipients.lock().unwrap().extend_from_slice(recipients);
            match self.redistribute_result.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(self.next_tx()),
            }
        }

        async fn fund_gas(&self, _relay: Address, _stipend: U256) -> Result<TxRef, ChainError> {
            self.fund_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.next_tx())
        }

        async fn transfer_token(
            &self,
            _relay: &RelayAccount,
            _to: Address,
            _amount: U256,
        ) -> Result<TxRef, ChainError> {
            self.transfer_calls.fetch_add(1, Ordering::SeqCst);
            match self.transfer_result.lock().unwrap().take() {
                Some(e) => Err(e),
                None => Ok(self.next_tx()),
            }
        }
    }

    /// Destination double: credited only after `credit_after` queries.
    pub(crate) struct MockLedger {
        pub credit_after: u32,
        pub queries: AtomicU32,
        pub submissions: AtomicU32,
        pub reject_with: Option<String>,
    }

    impl MockLedger {
        pub(crate) fn crediting_after(credit_after: u32) -> Self {
            Self {
                credit_after,
                queries: AtomicU32::new(0),
                submissions: AtomicU32::new(0),
                reject_with: None,
            }
        }
    }

    #[async_trait]
    impl DestinationLedger for MockLedger {
        async fn account_value(&self, _account: Address) -> Result<UsdcAmount, DestinationError> {
            let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
            if n > self.credit_after {
                Ok(UsdcAmount::from_whole(1_000))
            } else {
                Ok(UsdcAmount::ZERO)
            }
        }

        async fn submit_usd_send(
            &self,
            request: &SignedUsdSend,
        ) -> Result<ExchangeResponse, DestinationError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            assert!(matches!(request.signature.v, 27 | 28));
            match &self.reject_with {
                Some(detail) => Err(DestinationError::Rejected(detail.clone())),
                None => Ok(ExchangeResponse {
                    status: "ok".to_string(),
                    response: json!({"type": "default"}),
                }),
            }
        }
    }

    pub(crate) const DEST: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    pub(crate) const VAULT: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

    pub(crate) fn intent(amount: u64) -> Intent {
        Intent::new(DEST, UsdcAmount::from_whole(amount), VAULT).unwrap()
    }

    pub(crate) fn fast_config() -> PipelineConfig {
        PipelineConfig {
            credit: CreditWaiter::new(3, Duration::from_millis(10)),
            ..PipelineConfig::default()
        }
    }

    type Harness = (
        Arc<MockChain>,
        Arc<MockLedger>,
        Pipeline<MockChain, MockLedger>,
    );

    fn pipeline(chain: MockChain, ledger: MockLedger) -> Harness {
        let chain = Arc::new(chain);
        let ledger = Arc::new(ledger);
        let pipeline = Pipeline::new(chain.clone(), ledger.clone(), fast_config());
        (chain, ledger, pipeline)
    }

    #[tokio::test(start_paused = true)]
    async fn successful_run_produces_complete_proof() {
        let (_chain, ledger, pipeline) =
            pipeline(MockChain::default(), MockLedger::crediting_after(1));
        let (progress, rx) = watch::channel(PipelineState::Pending);
        let intent = intent(5);

        let proof = pipeline
            .run(&intent, &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert!(proof.success());
        assert_eq!(proof.amount(), intent.amount());
        assert_eq!(proof.destination_account(), intent.destination());
        assert_ne!(proof.relay_account(), intent.vault());
        assert_ne!(proof.relay_account(), intent.destination());

        let refs: HashSet<&str> = [
            proof.redistribute_tx_ref(),
            proof.funding_tx_ref(),
            proof.bridge_tx_ref(),
        ]
        .into_iter()
        .collect();
        assert_eq!(refs.len(), 3);
        assert_eq!(proof.destination_status(), Some("ok"));
        assert_eq!(*rx.borrow(), PipelineState::Completed);
        assert_eq!(ledger.queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn redistribution_goes_to_the_fresh_relay() {
        let (chain, _ledger, pipeline) =
            pipeline(MockChain::default(), MockLedger::crediting_after(0));
        let (progress, _rx) = watch::channel(PipelineState::Pending);

        let proof = pipeline
            .run(&intent(5), &progress, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*chain.recipients.lock().unwrap(), vec![proof.relay_account()]);
    }

    #[tokio::test(start_paused = true)]
    async fn same_intent_twice_uses_distinct_relays() {
        let (_chain, _ledger, pipeline) =
            pipeline(MockChain::default(), MockLedger::crediting_after(0));
        let (progress, _rx) = watch::channel(PipelineState::Pending);
        let cancel = CancellationToken::new();

        let first = pipeline.run(&intent(5), &progress, &cancel).await.unwrap();
        let second = pipeline.run(&intent(5), &progress, &cancel).await.unwrap();

        assert_ne!(first.relay_account(), second.relay_account());
    }

    #[tokio::test(start_paused = true)]
    async fn insufficient_vault_balance_halts_before_funding() {
        let chain = MockChain::failing_redistribute(ChainError::InsufficientVaultBalance(
            "Insufficient vault balance".to_string(),
        ));
        let (chain, ledger, pipeline) = pipeline(chain, MockLedger::crediting_after(0));
        let (progress, rx) = watch::channel(PipelineState::Pending);

        let failure = pipeline
            .run(&intent(5), &progress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.failed_at, PipelineStep::Redistributed);
        assert_eq!(failure.error.kind(), ErrorKind::InsufficientVaultBalance);
        assert_eq!(chain.redistribute_calls.load(Ordering::SeqCst), 1);
        assert_eq!(chain.later_calls(), 0);
        assert_eq!(ledger.queries.load(Ordering::SeqCst), 0);
        assert_eq!(ledger.submissions.load(Ordering::SeqCst), 0);
        assert_eq!(
            *rx.borrow(),
            PipelineState::Failed {
                at: PipelineStep::Redistributed
            }
        );

        let record = failure.record();
        assert_eq!(record.completed_steps, vec![PipelineStep::RelayGenerated]);
        assert!(record.relay_account.is_some());
        assert!(record.redistribute_tx_ref.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn bridge_timeout_fails_at_credited_and_skips_delivery() {
        let (_chain, ledger, pipeline) =
            pipeline(MockChain::default(), MockLedger::crediting_after(u32::MAX));
        let (progress, _rx) = watch::channel(PipelineState::Pending);

        let failure = pipeline
            .run(&intent(5), &progress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.failed_at, PipelineStep::Credited);
        assert_eq!(failure.error.kind(), ErrorKind::BridgeTimeout);
        assert_eq!(ledger.queries.load(Ordering::SeqCst), 3);
        assert_eq!(ledger.submissions.load(Ordering::SeqCst), 0);

        let record = failure.record();
        assert_eq!(
            record.completed_steps,
            vec![
                PipelineStep::RelayGenerated,
                PipelineStep::Redistributed,
                PipelineStep::Funded,
                PipelineStep::Bridged,
            ]
        );
        assert!(record.bridge_tx_ref.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn destination_rejection_is_fatal_and_not_retried() {
        let mut ledger = MockLedger::crediting_after(0);
        ledger.reject_with = Some("Insufficient balance".to_string());
        let (_chain, ledger, pipeline) = pipeline(MockChain::default(), ledger);
        let (progress, _rx) = watch::channel(PipelineState::Pending);

        let failure = pipeline
            .run(&intent(5), &progress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.failed_at, PipelineStep::DeliveredToDestination);
        assert_eq!(failure.error.kind(), ErrorKind::DestinationRejected);
        assert_eq!(ledger.submissions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn relay_balance_shortfall_is_a_transfer_error() {
        let chain = MockChain::default();
        *chain.transfer_result.lock().unwrap() =
            Some(ChainError::Transfer("relay holds 0".to_string()));
        let (_chain, ledger, pipeline) = pipeline(chain, MockLedger::crediting_after(0));
        let (progress, _rx) = watch::channel(PipelineState::Pending);

        let failure = pipeline
            .run(&intent(5), &progress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(failure.failed_at, PipelineStep::Bridged);
        assert_eq!(failure.error.kind(), ErrorKind::Transfer);
        assert_eq!(ledger.queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_step() {
        let (chain, _ledger, pipeline) =
            pipeline(MockChain::default(), MockLedger::crediting_after(0));
        let (progress, _rx) = watch::channel(PipelineState::Pending);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = pipeline.run(&intent(5), &progress, &cancel).await.unwrap_err();

        assert_eq!(failure.failed_at, PipelineStep::RelayGenerated);
        assert_eq!(failure.error.kind(), ErrorKind::Cancelled);
        assert_eq!(chain.redistribute_calls.load(Ordering::SeqCst), 0);
    }

    /// Chain whose redistribution never confirms; it fires `cancel` once
    /// the call is in flight.
    struct StalledChain {
        cancel: CancellationToken,
        fund_calls: AtomicU32,
    }

    #[async_trait]
    impl SourceChain for StalledChain {
        async fn redistribute(
            &self,
            _vault: Address,
            _recipients: &[Address],
            _amounts: &[U256],
        ) -> Result<TxRef, ChainError> {
            self.cancel.cancel();
            std::future::pending().await
        }

        async fn fund_gas(&self, _relay: Address, _stipend: U256) -> Result<TxRef, ChainError> {
            self.fund_calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending().await
        }

        async fn transfer_token(
            &self,
            _relay: &RelayAccount,
            _to: Address,
            _amount: U256,
        ) -> Result<TxRef, ChainError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancellation_interrupts_an_unconfirmed_step() {
        let cancel = CancellationToken::new();
        let chain = Arc::new(StalledChain {
            cancel: cancel.clone(),
            fund_calls: AtomicU32::new(0),
        });
        let pipeline = Pipeline::new(
            chain.clone(),
            Arc::new(MockLedger::crediting_after(0)),
            fast_config(),
        );
        let (progress, rx) = watch::channel(PipelineState::Pending);

        let failure = pipeline.run(&intent(5), &progress, &cancel).await.unwrap_err();

        assert_eq!(failure.failed_at, PipelineStep::Redistributed);
        assert_eq!(failure.error.kind(), ErrorKind::Cancelled);
        assert_eq!(chain.fund_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *rx.borrow(),
            PipelineState::Failed {
                at: PipelineStep::Redistributed
            }
        );
        assert!(failure.record().relay_account.is_some());
    }

    #[test]
    fn reverted_and_rejected_share_a_kind() {
        let reverted = ExecutionError::from(ChainError::Reverted {
            tx_hash: "0x01".to_string(),
        });
        let rejected = ExecutionError::from(ChainError::Rejected("nonce too low".to_string()));
        assert_eq!(reverted.kind(), ErrorKind::TransactionRejected);
        assert_eq!(rejected.kind(), ErrorKind::TransactionRejected);
    }

    #[test]
    fn steps_are_totally_ordered() {
        for pair in PipelineStep::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].next(), Some(pair[1]));
            assert_eq!(pair[0].ordinal() + 1, pair[1].ordinal());
        }
        assert_eq!(PipelineStep::DeliveredToDestination.next(), None);
    }
}
