// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bridge credit waiter.
//!
//! After the bridge transfer confirms on the source network, the relay
//! account's destination balance is polled at a fixed interval until it
//! covers the bridged amount. Every failed query counts as one ordinary
//! attempt. There is no backoff and no sleep after the final attempt.

use std::time::Duration;

use alloy::primitives::Address;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::client::{DestinationError, DestinationLedger};
use crate::blockchain::UsdcAmount;

/// Default number of balance queries.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default delay between queries.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Successful wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credited {
    /// Queries issued, including the one that observed the credit.
    pub attempts: u32,
    pub balance: UsdcAmount,
}

/// Fixed-interval poller over a [`DestinationLedger`].
#[derive(Debug, Clone, Copy)]
pub struct CreditWaiter {
    max_attempts: u32,
    interval: Duration,
}

impl Default for CreditWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL)
    }
}

impl CreditWaiter {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `account` holds at least `expected` on the destination.
    ///
    /// # Errors
    /// * [`DestinationError::BridgeTimeout`] after exactly `max_attempts` queries
    /// * [`DestinationError::Cancelled`] if `cancel` fires first
    pub async fn wait<D: DestinationLedger + ?Sized>(
        &self,
        ledger: &D,
        account: Address,
        expected: UsdcAmount,
        cancel: &CancellationToken,
    ) -> Result<Credited, DestinationError> {
        let started = Instant::now();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                return Err(DestinationError::Cancelled);
            }

            match ledger.account_value(account).await {
                Ok(balance) if balance >= expected => {
                    info!(attempt, %balance, "Bridge credit observed");
                    return Ok(Credited {
                        attempts: attempt,
                        balance,
                    });
                }
                Ok(balance) => {
                    debug!(
                        attempt,
                        max = self.max_attempts,
                        %balance,
                        %expected,
                        "Not credited yet"
                    );
                }
                Err(e) => {
                    warn!(attempt, max = self.max_attempts, error = %e, "Credit query failed");
                }
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = tokio::time::sleep(self.interval) => {}
                    _ = cancel.cancelled() => return Err(DestinationError::Cancelled),
                }
            }
        }

        Err(DestinationError::BridgeTimeout {
            attempts: self.max_attempts,
            waited: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::destination::client::ExchangeResponse;
    use crate::destination::signing::SignedUsdSend;

    /// Replays scripted balance responses, then repeats the fallback.
    struct ScriptedLedger {
        script: Mutex<VecDeque<Result<UsdcAmount, DestinationError>>>,
        fallback: Result<UsdcAmount, DestinationError>,
        calls: AtomicU32,
    }

    impl ScriptedLedger {
        fn new(
            script: Vec<Result<UsdcAmount, DestinationError>>,
            fallback: Result<UsdcAmount, DestinationError>,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DestinationLedger for ScriptedLedger {
        async fn account_value(&self, _account: Address) -> Result<UsdcAmount, DestinationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| self.fallback.clone())
        }

        async fn submit_usd_send(
            &self,
            _request: &SignedUsdSend,
        ) -> Result<ExchangeResponse, DestinationError> {
            unreachable!("credit waiter never submits")
        }
    }

    const EXPECTED: UsdcAmount = UsdcAmount::from_whole(5);

    fn below() -> Result<UsdcAmount, DestinationError> {
        Ok(UsdcAmount::from_raw(4_999_999))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_exactly_k_plus_one_polls() {
        for k in [0usize, 1, 7, 29] {
            let ledger = ScriptedLedger::new(vec![below(); k], Ok(EXPECTED));
            let credited = CreditWaiter::default()
                .wait(&ledger, Address::ZERO, EXPECTED, &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(ledger.calls(), k as u32 + 1);
            assert_eq!(credited.attempts, k as u32 + 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_exactly_max_attempts() {
        let ledger = ScriptedLedger::new(vec![], below());
        let started = Instant::now();

        let err = CreditWaiter::default()
            .wait(&ledger, Address::ZERO, EXPECTED, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(ledger.calls(), DEFAULT_MAX_ATTEMPTS);
        // No sleep after the last attempt.
        assert_eq!(started.elapsed(), DEFAULT_POLL_INTERVAL * (DEFAULT_MAX_ATTEMPTS - 1));
        assert!(matches!(
            err,
            DestinationError::BridgeTimeout { attempts: DEFAULT_MAX_ATTEMPTS, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn query_failures_count_like_sub_threshold_polls() {
        let transient = || Err(DestinationError::Transient("connection reset".to_string()));
        let script = vec![transient(), below(), transient(), transient()];
        let ledger = ScriptedLedger::new(script, Ok(EXPECTED));

        let credited = CreditWaiter::default()
            .wait(&ledger, Address::ZERO, EXPECTED, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(credited.attempts, 5);

        let always_failing = ScriptedLedger::new(vec![], transient());
        let err = CreditWaiter::new(4, Duration::from_secs(1))
            .wait(&always_failing, Address::ZERO, EXPECTED, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(always_failing.calls(), 4);
        assert!(matches!(err, DestinationError::BridgeTimeout { attempts: 4, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn balance_above_expected_counts_as_credited() {
        let ledger = ScriptedLedger::new(vec![], Ok(UsdcAmount::from_whole(6)));
        let credited = CreditWaiter::default()
            .wait(&ledger, Address::ZERO, EXPECTED, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(credited.balance, UsdcAmount::from_whole(6));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_wait() {
        let ledger = ScriptedLedger::new(vec![], below());
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(12)).await;
                cancel.cancel();
            })
        };

        let err = CreditWaiter::default()
            .wait(&ledger, Address::ZERO, EXPECTED, &cancel)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err, DestinationError::Cancelled);
        // Polls at t=0, 5, 10; cancelled during the third sleep.
        assert_eq!(ledger.calls(), 3);
    }
}
