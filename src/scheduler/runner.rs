//! Swap scheduler
//!
//! Drives a run as a single background task:
//!
//! ```text
//! ┌─> cancelled? ── yes ──> Stopped
//! │       │ no
//! │   gas admits? ── no ──> count delay ──┐
//! │       │ yes                            │
//! │   execute swap ── err ──> Failed       │
//! │       │ ok                             │
//! │   record, rotate ── target hit ──> Completed
//! │       │                                │
//! └── sleep(interval) or cancel <──────────┘
//! ```
//!
//! Exactly one swap is in flight at a time. Cancellation is checked before
//! every swap and every re-arm, so a stop issued mid-swap lets that swap
//! finish and record its result but schedules nothing further. Such a run
//! ends as stopped even if that swap was the last one.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chain::units::short_address;
use crate::error::{Error, Result};
use crate::fee_guard::AdmissionGate;
use crate::scheduler::config::SwapConfiguration;
use crate::scheduler::state::{CycleState, RunStatus};
use crate::trading::{ForwardOutcome, SwapExecution, SwapOrder};
use crate::wallet::WalletSet;

/// Details of the swap that ended a run
#[derive(Debug)]
pub struct RunFailure {
    /// 1-based cycle number
    pub cycle: u64,
    pub wallet_index: usize,
    pub wallet: Address,
    pub error: Error,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed { executed: u64 },
    Stopped { executed: u64 },
    Failed(RunFailure),
}

struct ActiveRun {
    id: Uuid,
    cancel: CancellationToken,
    /// Cancelled once the run task has exited
    finished: CancellationToken,
    handle: Option<JoinHandle<RunOutcome>>,
}

/// Runs ping-pong swap sequences across a wallet set
pub struct SwapScheduler<E, G> {
    executor: Arc<E>,
    gate: Arc<G>,
    state: Arc<RwLock<CycleState>>,
    active: Mutex<Option<ActiveRun>>,
}

impl<E, G> SwapScheduler<E, G>
where
    E: SwapExecution + 'static,
    G: AdmissionGate + 'static,
{
    pub fn new(executor: Arc<E>, gate: Arc<G>) -> Self {
        Self {
            executor,
            gate,
            state: Arc::new(RwLock::new(CycleState::default())),
            active: Mutex::new(None),
        }
    }

    /// Validate and launch a run. The first cycle starts immediately.
    pub async fn start(&self, config: SwapConfiguration, wallets: WalletSet) -> Result<Uuid> {
        let addresses = wallets.addresses()?;
        config.validate(&addresses)?;

        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|run| !run.finished.is_cancelled()) {
            return Err(Error::AlreadyRunning);
        }

        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        *self.state.write().await = CycleState::begin(&config);

        info!(
            run = %id,
            "Starting run: {} pair(s) of {} ⇄ {} across {} wallet(s), every {:?}",
            config.total_cycle_pairs,
            config.input_token.symbol,
            config.output_token.symbol,
            wallets.len(),
            config.interval
        );
        if let Some(target) = config.forward_to {
            info!(run = %id, "Outbound proceeds forwarded to {}", target);
        }

        let task = RunTask {
            id,
            config,
            wallets,
            addresses,
            executor: Arc::clone(&self.executor),
            gate: Arc::clone(&self.gate),
            state: Arc::clone(&self.state),
            cancel: cancel.clone(),
        };
        let done = finished.clone();
        let handle = tokio::spawn(async move {
            // Fires on unwind as well
            let _finished = done.drop_guard();
            task.run().await
        });

        *active = Some(ActiveRun {
            id,
            cancel,
            finished,
            handle: Some(handle),
        });
        Ok(id)
    }

    /// Stop the current run. Idempotent; a swap already in flight finishes.
    pub async fn stop(&self) {
        let active = self.active.lock().await;
        let Some(run) = active.as_ref() else {
            return;
        };
        if !run.cancel.is_cancelled() {
            info!(run = %run.id, "Stop requested");
            run.cancel.cancel();
        }

        let mut state = self.state.write().await;
        if state.is_running {
            state.halt();
        }
    }

    /// Wait for the current run to end
    pub async fn wait(&self) -> Result<RunOutcome> {
        let handle = {
            let mut active = self.active.lock().await;
            active
                .as_mut()
                .and_then(|run| run.handle.take())
                .ok_or_else(|| Error::Internal("no run to wait for".into()))?
        };

        handle
            .await
            .map_err(|e| Error::Internal(format!("scheduler task ended abnormally: {}", e)))
    }

    /// Copy of the current progress
    pub async fn snapshot(&self) -> CycleState {
        self.state.read().await.clone()
    }
}

struct RunTask<E, G> {
    id: Uuid,
    config: SwapConfiguration,
    wallets: WalletSet,
    addresses: Vec<Address>,
    executor: Arc<E>,
    gate: Arc<G>,
    state: Arc<RwLock<CycleState>>,
    cancel: CancellationToken,
}

impl<E: SwapExecution, G: AdmissionGate> RunTask<E, G> {
    async fn run(self) -> RunOutcome {
        loop {
            if self.cancel.is_cancelled() {
                return self.halted().await;
            }

            // Step 1: Fee gate
            let fee = self.gate.current_fee_level().await;
            if !fee.admits() {
                let delays = {
                    let mut state = self.state.write().await;
                    state.record_fee_delay();
                    state.fee_delays
                };
                if fee.is_known() {
                    warn!(
                        run = %self.id,
                        "Gas {:.2} gwei at or above ceiling, delaying cycle ({} so far)",
                        fee.price_gwei(),
                        delays
                    );
                } else {
                    warn!(run = %self.id, "Gas price not yet known, delaying cycle");
                }
                if !self.rearm().await {
                    return self.halted().await;
                }
                continue;
            }
            if self.cancel.is_cancelled() {
                return self.halted().await;
            }

            // Step 2: Pick wallet, direction and amount
            let (index, direction, amount, cycle) = {
                let state = self.state.read().await;
                (
                    state.active_wallet_index,
                    state.direction,
                    state.amount_to_use(&self.config),
                    state.executed_count + 1,
                )
            };
            let Some(secret) = self.wallets.get(index) else {
                return self
                    .failed(cycle, index, Error::Internal(format!("wallet {} missing", index)))
                    .await;
            };
            let (from, to) = self.config.legs(direction);

            info!(
                run = %self.id,
                "Cycle {}/{}: {} {} → {} from wallet #{} ({})",
                cycle,
                self.config.target_count(),
                amount,
                from.symbol,
                to.symbol,
                index,
                short_address(&self.addresses[index])
            );

            // Step 3: Execute
            let order = SwapOrder {
                secret,
                from_token: from.address,
                to_token: to.address,
                amount,
                direction,
                forward_to: self.config.forward_to.filter(|_| direction.is_outbound()),
            };
            let receipt = match self.executor.execute_swap(order).await {
                Ok(receipt) => receipt,
                Err(e) => return self.failed(cycle, index, e).await,
            };

            // Step 4: Record and rotate
            let (complete, status) = {
                let mut state = self.state.write().await;
                let complete = state.record_success(
                    receipt.actually_received,
                    self.wallets.len(),
                    self.config.is_fixed_leg(),
                );
                (complete, state.status)
            };
            info!(
                run = %self.id,
                "Cycle {} done: received {} {} (tx {})",
                cycle,
                receipt.actually_received,
                to.symbol,
                receipt.tx_hash
            );
            if let Some(ForwardOutcome::Failed { reason, .. }) = &receipt.forward {
                warn!(run = %self.id, "Cycle {}: {}", cycle, reason);
            }

            // The recorded status decides, so the outcome matches snapshot()
            if complete {
                if status != RunStatus::Completed {
                    return self.halted().await;
                }
                info!(run = %self.id, "Run completed after {} swap(s)", cycle);
                return RunOutcome::Completed { executed: cycle };
            }

            // Step 5: Re-arm unless stopped
            if self.cancel.is_cancelled() || !self.rearm().await {
                return self.halted().await;
            }
        }
    }

    /// Wait one interval. Returns false if cancelled first.
    async fn rearm(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = sleep(self.config.interval) => true,
        }
    }

    async fn halted(&self) -> RunOutcome {
        let mut state = self.state.write().await;
        state.halt();
        info!(run = %self.id, "Run stopped after {} swap(s)", state.executed_count);
        RunOutcome::Stopped {
            executed: state.executed_count,
        }
    }

    async fn failed(&self, cycle: u64, wallet_index: usize, error: Error) -> RunOutcome {
        let wallet = self
            .addresses
            .get(wallet_index)
            .copied()
            .unwrap_or(Address::ZERO);
        error!(
            run = %self.id,
            "Cycle {} failed on wallet #{} ({}): {}",
            cycle,
            wallet_index,
            short_address(&wallet),
            error
        );
        self.state.write().await.fail(error.to_string());
        RunOutcome::Failed(RunFailure {
            cycle,
            wallet_index,
            wallet,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use crate::fee_guard::FeeObservation;
    use crate::scheduler::config::fixtures::{config, USDC, WAVAX};
    use crate::trading::{Direction, QuoteResult, SwapExecutor, SwapReceipt};
    use crate::wallet::secret::fixtures::*;
    use crate::wallet::Secret;
    use alloy::primitives::{TxHash, U256};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq)]
    struct Call {
        wallet: Address,
        from: Address,
        to: Address,
        amount: U256,
        forward_to: Option<Address>,
    }

    /// Returns amount + 1 and records every call
    #[derive(Default)]
    struct ScriptedExecutor {
        calls: std::sync::Mutex<Vec<Call>>,
        fail_on_call: Option<usize>,
        release: Option<Arc<Notify>>,
    }

    impl ScriptedExecutor {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SwapExecution for ScriptedExecutor {
        async fn execute_swap(&self, order: SwapOrder<'_>) -> Result<SwapReceipt> {
            let wallet = order.secret.address()?;
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(Call {
                    wallet,
                    from: order.from_token,
                    to: order.to_token,
                    amount: order.amount,
                    forward_to: order.forward_to,
                });
                calls.len()
            };
            if let Some(release) = &self.release {
                release.notified().await;
            }
            if self.fail_on_call == Some(n) {
                return Err(Error::Swap("execution reverted".into()));
            }
            let received = order.amount + U256::from(1u64);
            Ok(SwapReceipt {
                tx_hash: TxHash::with_last_byte(n as u8),
                wallet,
                quote: QuoteResult::from_expected(received),
                actually_received: received,
                forward: None,
            })
        }
    }

    /// Rejects the first `blocked` queries, then admits
    struct ScriptedGate {
        blocked: usize,
        queries: AtomicUsize,
        /// Each answer waits for a notification
        hold: Option<Arc<Notify>>,
    }

    impl ScriptedGate {
        fn open() -> Self {
            Self::blocking(0)
        }

        fn blocking(blocked: usize) -> Self {
            Self {
                blocked,
                queries: AtomicUsize::new(0),
                hold: None,
            }
        }
    }

    #[async_trait]
    impl AdmissionGate for ScriptedGate {
        async fn current_fee_level(&self) -> FeeObservation {
            if let Some(hold) = &self.hold {
                hold.notified().await;
            }
            let n = self.queries.fetch_add(1, Ordering::SeqCst);
            let price_gwei = if n < self.blocked { 30 } else { 1 };
            FeeObservation::observed(price_gwei * 1_000_000_000, 2_000_000_000)
        }
    }

    fn wallets(keys: &[&str]) -> WalletSet {
        WalletSet::from_secrets(keys.iter().map(|k| Secret::from_hex(k).unwrap()).collect())
    }

    fn address(key: &str) -> Address {
        Secret::from_hex(key).unwrap().address().unwrap()
    }

    fn scheduler(
        executor: ScriptedExecutor,
        gate: ScriptedGate,
    ) -> (Arc<ScriptedExecutor>, SwapScheduler<ScriptedExecutor, ScriptedGate>) {
        let executor = Arc::new(executor);
        let scheduler = SwapScheduler::new(executor.clone(), Arc::new(gate));
        (executor, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_wallet_ping_pong() {
        let (executor, scheduler) = scheduler(ScriptedExecutor::default(), ScriptedGate::open());

        scheduler.start(config(2, None), wallets(&[KEY_0, KEY_1])).await.unwrap();
        let outcome = scheduler.wait().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Completed { executed: 4 }));

        let (w0, w1) = (address(KEY_0), address(KEY_1));
        let trace: Vec<_> = executor
            .calls()
            .into_iter()
            .map(|c| (c.wallet, c.from, c.to, c.amount))
            .collect();
        assert_eq!(
            trace,
            vec![
                (w0, USDC, WAVAX, U256::from(100u64)),
                (w1, WAVAX, USDC, U256::from(101u64)),
                (w0, USDC, WAVAX, U256::from(102u64)),
                (w1, WAVAX, USDC, U256::from(103u64)),
            ]
        );

        let state = scheduler.snapshot().await;
        assert_eq!(state.status, RunStatus::Completed);
        assert_eq!(state.executed_count, 4);
        assert!(!state.is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forward_mode_repeats_fixed_outbound_leg() {
        let treasury = Address::repeat_byte(0xAA);
        let (executor, scheduler) = scheduler(ScriptedExecutor::default(), ScriptedGate::open());

        scheduler
            .start(config(1, Some(treasury)), wallets(&[KEY_0, KEY_1, KEY_2]))
            .await
            .unwrap();
        assert!(matches!(
            scheduler.wait().await.unwrap(),
            RunOutcome::Completed { executed: 2 }
        ));

        let calls = executor.calls();
        assert_eq!(calls.len(), 2);
        for call in &calls {
            assert_eq!((call.from, call.to), (USDC, WAVAX));
            assert_eq!(call.amount, U256::from(100u64));
            assert_eq!(call.forward_to, Some(treasury));
        }
        assert_eq!(calls[1].wallet, address(KEY_1));
        assert_eq!(scheduler.snapshot().await.direction, Direction::Forward);
    }

    #[tokio::test(start_paused = true)]
    async fn test_high_gas_delays_without_swapping() {
        let (executor, scheduler) =
            scheduler(ScriptedExecutor::default(), ScriptedGate::blocking(3));

        scheduler.start(config(1, None), wallets(&[KEY_0])).await.unwrap();
        assert!(matches!(
            scheduler.wait().await.unwrap(),
            RunOutcome::Completed { executed: 2 }
        ));

        let state = scheduler.snapshot().await;
        assert_eq!(state.fee_delays, 3);
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_ends_run_with_cause() {
        let executor = ScriptedExecutor {
            fail_on_call: Some(2),
            ..Default::default()
        };
        let (executor, scheduler) = scheduler(executor, ScriptedGate::open());

        scheduler.start(config(3, None), wallets(&[KEY_0, KEY_1])).await.unwrap();
        let RunOutcome::Failed(failure) = scheduler.wait().await.unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(failure.cycle, 2);
        assert_eq!(failure.wallet_index, 1);
        assert_eq!(failure.wallet, address(KEY_1));
        assert!(matches!(failure.error, Error::Swap(_)));

        let state = scheduler.snapshot().await;
        assert_eq!(state.status, RunStatus::Failed);
        assert!(!state.is_running);
        assert_eq!(state.executed_count, 1);
        assert!(state.last_error.is_some());
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_cycle() {
        let (executor, scheduler) = scheduler(ScriptedExecutor::default(), ScriptedGate::open());
        let mut config = config(5, None);
        config.interval = Duration::from_secs(60);

        scheduler.start(config, wallets(&[KEY_0])).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(executor.calls().len(), 1);

        scheduler.stop().await;
        scheduler.stop().await;
        assert!(matches!(
            scheduler.wait().await.unwrap(),
            RunOutcome::Stopped { executed: 1 }
        ));

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(executor.calls().len(), 1);
        assert_eq!(scheduler.snapshot().await.status, RunStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_swap_records_result_but_schedules_nothing() {
        let release = Arc::new(Notify::new());
        let executor = ScriptedExecutor {
            release: Some(release.clone()),
            ..Default::default()
        };
        let (executor, scheduler) = scheduler(executor, ScriptedGate::open());

        scheduler.start(config(5, None), wallets(&[KEY_0])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(executor.calls().len(), 1);

        scheduler.stop().await;
        assert!(!scheduler.snapshot().await.is_running);
        release.notify_one();

        assert!(matches!(
            scheduler.wait().await.unwrap(),
            RunOutcome::Stopped { executed: 1 }
        ));
        let state = scheduler.snapshot().await;
        assert_eq!(state.executed_count, 1);
        assert_eq!(state.status, RunStatus::Stopped);
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_final_swap_reports_stopped() {
        let release = Arc::new(Notify::new());
        let executor = ScriptedExecutor {
            release: Some(release.clone()),
            ..Default::default()
        };
        let (executor, scheduler) = scheduler(executor, ScriptedGate::open());

        scheduler.start(config(1, None), wallets(&[KEY_0])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        release.notify_one();
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(executor.calls().len(), 2);

        scheduler.stop().await;
        release.notify_one();

        let outcome = scheduler.wait().await.unwrap();
        assert!(matches!(outcome, RunOutcome::Stopped { executed: 2 }));
        let state = scheduler.snapshot().await;
        assert_eq!(state.status, RunStatus::Stopped);
        assert_eq!(state.executed_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_gas_check_launches_no_swap() {
        let hold = Arc::new(Notify::new());
        let gate = ScriptedGate {
            hold: Some(hold.clone()),
            ..ScriptedGate::open()
        };
        let (executor, scheduler) = scheduler(ScriptedExecutor::default(), gate);

        scheduler.start(config(1, None), wallets(&[KEY_0])).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        scheduler.stop().await;
        hold.notify_one();

        assert!(matches!(
            scheduler.wait().await.unwrap(),
            RunOutcome::Stopped { executed: 0 }
        ));
        assert!(executor.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_carries_measured_output_through_real_executor() {
        let chain = Arc::new(MockChain::new());
        chain.set_rate(USDC, WAVAX, 2, 1).await;
        chain.set_rate(WAVAX, USDC, 1, 2).await;
        chain.ledger.lock().await.transfer_fee_bps = 100;
        let (w0, w1) = (address(KEY_0), address(KEY_1));
        chain.fund(USDC, w0, U256::from(1_000u64)).await;
        chain.fund(WAVAX, w1, U256::from(1_000u64)).await;

        let executor = Arc::new(SwapExecutor::new(chain.clone()));
        let scheduler = SwapScheduler::new(executor, Arc::new(ScriptedGate::open()));
        scheduler.start(config(1, None), wallets(&[KEY_0, KEY_1])).await.unwrap();
        assert!(matches!(
            scheduler.wait().await.unwrap(),
            RunOutcome::Completed { executed: 2 }
        ));

        // 100 USDC -> 200 WAVAX quoted, 198 delivered; 198 WAVAX -> 99 USDC quoted, 98 delivered
        {
            let ledger = chain.ledger.lock().await;
            assert_eq!(ledger.swaps[0].amount_in, U256::from(100u64));
            assert_eq!(ledger.swaps[1].amount_in, U256::from(198u64));
            assert_eq!(ledger.swaps[1].recipient, w1);
        }
        assert_eq!(chain.balance(USDC, w0).await, U256::from(900u64));
        assert_eq!(chain.balance(WAVAX, w0).await, U256::from(198u64));
        assert_eq!(chain.balance(WAVAX, w1).await, U256::from(802u64));
        assert_eq!(chain.balance(USDC, w1).await, U256::from(98u64));
        assert_eq!(scheduler.snapshot().await.last_amount_carried, U256::from(98u64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_rejected_while_running() {
        let (_, scheduler) = scheduler(ScriptedExecutor::default(), ScriptedGate::open());
        let mut slow = config(5, None);
        slow.interval = Duration::from_secs(60);

        scheduler.start(slow.clone(), wallets(&[KEY_0])).await.unwrap();
        assert!(matches!(
            scheduler.start(slow, wallets(&[KEY_1])).await,
            Err(Error::AlreadyRunning)
        ));

        scheduler.stop().await;
        scheduler.wait().await.unwrap();
        scheduler.start(config(1, None), wallets(&[KEY_1])).await.unwrap();
        assert!(matches!(
            scheduler.wait().await.unwrap(),
            RunOutcome::Completed { .. }
        ));
    }

    #[tokio::test]
    async fn test_start_validates_before_running() {
        let (executor, scheduler) = scheduler(ScriptedExecutor::default(), ScriptedGate::open());

        assert!(matches!(
            scheduler.start(config(1, None), WalletSet::new()).await,
            Err(Error::NoWallets)
        ));
        assert!(matches!(
            scheduler
                .start(config(1, Some(address(KEY_0))), wallets(&[KEY_0]))
                .await,
            Err(Error::ForwardTargetInRotation(_))
        ));
        assert!(executor.calls().is_empty());
        assert_eq!(scheduler.snapshot().await.status, RunStatus::Idle);
    }
}
