//! Single-swap execution
//!
//! One call to [`SwapExecutor::execute_swap`] runs the full sequence for one
//! wallet:
//!
//! ```text
//! balance check → allowance (approve MAX if short) → quote → snapshot output balance
//!     → swapExactTokensForTokens → measure output delta → optional forward
//! ```
//!
//! The amount carried to the next cycle is the measured delta, never the
//! quote. Fee-on-transfer tokens and slippage make the two differ.

use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::chain::units::short_address;
use crate::chain::{ChainClient, SwapCall};
use crate::error::{Error, Result};
use crate::trading::quote::QuoteResult;
use crate::trading::types::{ForwardOutcome, SwapOrder, SwapReceipt};

/// Seconds until the router rejects a submitted swap
pub const SWAP_DEADLINE_SECS: i64 = 20 * 60;

/// Something that can carry out one swap
#[async_trait]
pub trait SwapExecution: Send + Sync {
    async fn execute_swap(&self, order: SwapOrder<'_>) -> Result<SwapReceipt>;
}

/// Executes swaps against a Uniswap-V2 style router
pub struct SwapExecutor<C> {
    chain: Arc<C>,
}

impl<C: ChainClient> SwapExecutor<C> {
    pub fn new(chain: Arc<C>) -> Self {
        Self { chain }
    }

    /// Approve the router for the maximum amount if the allowance is short
    async fn ensure_allowance(&self, order: &SwapOrder<'_>) -> Result<()> {
        let signer = order.secret.signer()?;
        let owner = signer.address();
        let router = self.chain.router_address();

        let allowance = self.chain.allowance(order.from_token, owner, router).await?;
        if allowance >= order.amount {
            debug!("Allowance sufficient for {}", short_address(&owner));
            return Ok(());
        }

        info!(
            "Approving router for {} on {}",
            short_address(&order.from_token),
            short_address(&owner)
        );
        let tx_hash = self
            .chain
            .approve(&signer, order.from_token, router, U256::MAX)
            .await
            .map_err(|e| match e {
                Error::TransactionReverted(hash) => Error::Approval(format!("{} reverted", hash)),
                other => other,
            })?;
        info!("Approval confirmed: {}", tx_hash);
        Ok(())
    }

    /// Transfer outbound proceeds to the treasury wallet
    ///
    /// Failure is recorded on the receipt and does not fail the swap.
    async fn forward(
        &self,
        order: &SwapOrder<'_>,
        amount: U256,
    ) -> Result<Option<ForwardOutcome>> {
        let Some(target) = order.forward_to.filter(|_| order.direction.is_outbound()) else {
            return Ok(None);
        };

        let signer = order.secret.signer()?;
        let outcome = match self.chain.transfer(&signer, order.to_token, target, amount).await {
            Ok(tx_hash) => {
                info!("Forwarded {} to {}: {}", amount, short_address(&target), tx_hash);
                ForwardOutcome::Sent { to: target, tx_hash }
            }
            Err(e) => {
                let reason = Error::Forward(e.to_string()).to_string();
                warn!("{} (swap already settled)", reason);
                ForwardOutcome::Failed { to: target, reason }
            }
        };
        Ok(Some(outcome))
    }
}

#[async_trait]
impl<C: ChainClient + 'static> SwapExecution for SwapExecutor<C> {
    async fn execute_swap(&self, order: SwapOrder<'_>) -> Result<SwapReceipt> {
        let signer = order.secret.signer()?;
        let wallet = signer.address();

        // Step 1: Balance check
        let balance = self.chain.balance_of(order.from_token, wallet).await?;
        if balance < order.amount {
            return Err(Error::InsufficientBalance {
                available: balance.to_string(),
                required: order.amount.to_string(),
            });
        }

        // Step 2: Allowance
        self.ensure_allowance(&order).await?;

        // Step 3: Quote
        let path = vec![order.from_token, order.to_token];
        let expected = self.chain.quote_output(&path, order.amount).await?;
        if expected.is_zero() {
            return Err(Error::Quote("router quoted zero output".into()));
        }
        let quote = QuoteResult::from_expected(expected);

        // Step 4: Snapshot the output balance
        let before = self.chain.balance_of(order.to_token, wallet).await?;

        // Step 5: Swap
        let call = SwapCall {
            amount_in: order.amount,
            min_amount_out: quote.minimum_acceptable_output,
            path,
            recipient: wallet,
            deadline: U256::from((Utc::now().timestamp() + SWAP_DEADLINE_SECS).max(0) as u64),
        };
        info!(
            "Swapping {} {} → {} from {} (min out {})",
            order.amount,
            short_address(&order.from_token),
            short_address(&order.to_token),
            short_address(&wallet),
            quote.minimum_acceptable_output
        );
        let tx_hash = self
            .chain
            .swap_exact_input(&signer, &call)
            .await
            .map_err(|e| match e {
                Error::TransactionReverted(hash) => Error::Swap(format!("{} reverted", hash)),
                other => other,
            })?;

        // Step 6: Measure what actually arrived
        let after = self.chain.balance_of(order.to_token, wallet).await?;
        if after <= before {
            let delta = if after < before {
                format!("-{}", before - after)
            } else {
                "0".to_string()
            };
            return Err(Error::NoOutputDetected(delta));
        }
        let actually_received = after - before;
        if actually_received < quote.expected_output {
            debug!(
                "Received {} against quoted {}",
                actually_received, quote.expected_output
            );
        }

        // Step 7: Optional forward
        let forward = self.forward(&order, actually_received).await?;

        Ok(SwapReceipt {
            tx_hash,
            wallet,
            quote,
            actually_received,
            forward,
        })
    }
}
