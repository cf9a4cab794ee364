//! Gas price admission gate
//!
//! Polls the network gas price in the background and answers one question
//! for the scheduler: may a swap start now? Until the first successful poll
//! the level is unknown and the answer is no.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::chain::units::{gwei_to_wei, wei_to_gwei};
use crate::chain::FeeOracle;
use crate::error::Result;

/// Time between gas price polls
pub const FEE_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Latest known fee level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeObservation {
    pub price_wei: u128,
    pub is_above_threshold: bool,
    /// `None` until the first successful poll
    pub observed_at: Option<DateTime<Utc>>,
}

impl FeeObservation {
    /// Level before anything has been observed. Never admits.
    pub fn unknown() -> Self {
        Self {
            price_wei: 0,
            is_above_threshold: true,
            observed_at: None,
        }
    }

    pub fn observed(price_wei: u128, ceiling_wei: u128) -> Self {
        Self {
            price_wei,
            is_above_threshold: is_above_threshold(price_wei, ceiling_wei),
            observed_at: Some(Utc::now()),
        }
    }

    pub fn is_known(&self) -> bool {
        self.observed_at.is_some()
    }

    pub fn price_gwei(&self) -> f64 {
        wei_to_gwei(self.price_wei)
    }

    /// Whether a new swap may start
    pub fn admits(&self) -> bool {
        !self.is_above_threshold
    }
}

/// A price equal to the ceiling counts as too high
pub fn is_above_threshold(price_wei: u128, ceiling_wei: u128) -> bool {
    price_wei >= ceiling_wei
}

/// Source of admission decisions for the scheduler
#[async_trait]
pub trait AdmissionGate: Send + Sync {
    async fn current_fee_level(&self) -> FeeObservation;
}

/// Background gas price monitor
pub struct FeeGuard {
    oracle: Arc<dyn FeeOracle>,
    ceiling_wei: u128,
    latest: Arc<RwLock<FeeObservation>>,
    shutdown: CancellationToken,
}

impl FeeGuard {
    pub fn new(oracle: Arc<dyn FeeOracle>, ceiling_gwei: f64) -> Self {
        Self {
            oracle,
            ceiling_wei: gwei_to_wei(ceiling_gwei),
            latest: Arc::new(RwLock::new(FeeObservation::unknown())),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn ceiling_gwei(&self) -> f64 {
        wei_to_gwei(self.ceiling_wei)
    }

    /// Poll once. A failed poll keeps the previous observation.
    pub async fn refresh(&self) -> Result<FeeObservation> {
        match self.oracle.gas_price().await {
            Ok(price_wei) => {
                let observation = FeeObservation::observed(price_wei, self.ceiling_wei);
                *self.latest.write().await = observation;
                debug!(
                    "Gas price {:.2} gwei (ceiling {:.2}, admits: {})",
                    observation.price_gwei(),
                    self.ceiling_gwei(),
                    observation.admits()
                );
                Ok(observation)
            }
            Err(e) => {
                warn!("Gas price poll failed, keeping last level: {}", e);
                Err(e)
            }
        }
    }

    /// Start polling every `period` until [`FeeGuard::stop`] is called
    pub fn spawn(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let guard = Arc::clone(self);
        info!("Starting fee guard with {:?} poll interval", period);

        tokio::spawn(async move {
            let mut ticker = interval(period);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Errors are logged in refresh
                        let _ = guard.refresh().await;
                    }
                    _ = guard.shutdown.cancelled() => {
                        info!("Fee guard shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Stop the polling loop
    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl AdmissionGate for FeeGuard {
    async fn current_fee_level(&self) -> FeeObservation {
        *self.latest.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;

    const GWEI: u128 = 1_000_000_000;

    #[test]
    fn test_threshold_is_inclusive() {
        assert!(is_above_threshold(2 * GWEI, 2 * GWEI));
        assert!(is_above_threshold(3 * GWEI, 2 * GWEI));
        assert!(!is_above_threshold(2 * GWEI - 1, 2 * GWEI));
    }

    #[tokio::test]
    async fn test_unknown_until_first_poll() {
        let chain = Arc::new(MockChain::new());
        let guard = FeeGuard::new(chain, 2.0);

        let level = guard.current_fee_level().await;
        assert!(!level.is_known());
        assert!(!level.admits());
    }

    #[tokio::test]
    async fn test_refresh_tracks_price() {
        let chain = Arc::new(MockChain::new());
        let guard = FeeGuard::new(chain.clone(), 2.0);

        chain.set_gas_price(GWEI).await;
        assert!(guard.refresh().await.unwrap().admits());

        chain.set_gas_price(25 * GWEI).await;
        guard.refresh().await.unwrap();
        let level = guard.current_fee_level().await;
        assert!(!level.admits());
        assert!((level.price_gwei() - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_last_level() {
        let chain = Arc::new(MockChain::new());
        let guard = FeeGuard::new(chain.clone(), 2.0);

        chain.set_gas_price(GWEI).await;
        let good = guard.refresh().await.unwrap();

        chain.ledger.lock().await.fail_gas_reads = true;
        assert!(guard.refresh().await.is_err());
        assert_eq!(guard.current_fee_level().await, good);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_polling_and_stop() {
        let chain = Arc::new(MockChain::new());
        chain.set_gas_price(5 * GWEI).await;
        let guard = Arc::new(FeeGuard::new(chain.clone(), 2.0));

        let handle = guard.spawn(FEE_POLL_INTERVAL);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!guard.current_fee_level().await.admits());

        chain.set_gas_price(GWEI).await;
        tokio::time::sleep(FEE_POLL_INTERVAL).await;
        assert!(guard.current_fee_level().await.admits());

        guard.stop();
        handle.await.unwrap();
    }
}
