//! JSON-RPC chain client
//!
//! Reads (balances, allowances, decimals, gas price) are retried with
//! exponential backoff. Writes are sent exactly once: a failed approval,
//! swap or transfer is reported, never resubmitted.

use std::time::Duration;

use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use tracing::{debug, info, warn};
use url::Url;

use crate::chain::abi::{IJoeRouter, IERC20};
use crate::chain::{DexRouter, FeeOracle, SwapCall, TokenContract};
use crate::config::RpcConfig;
use crate::error::{Error, Result};

/// Alloy-backed implementation of the chain traits
#[derive(Clone)]
pub struct RpcChainClient {
    provider: DynProvider,
    router: Address,
    timeout: Duration,
    retry_base_delay: Duration,
    max_retry_elapsed: Duration,
}

impl RpcChainClient {
    /// Connect over HTTP and check the endpoint serves the expected chain
    pub async fn connect(config: &RpcConfig, router: Address) -> Result<Self> {
        let url: Url = config
            .endpoint
            .parse()
            .map_err(|e| Error::Config(format!("Invalid RPC endpoint: {}", e)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        let client = Self {
            provider,
            router,
            timeout: Duration::from_millis(config.timeout_ms),
            retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_retry_elapsed: Duration::from_millis(config.max_retry_elapsed_ms),
        };

        let chain_id = client
            .read(|| async {
                client
                    .provider
                    .get_chain_id()
                    .await
                    .map_err(|e| Error::Rpc(format!("eth_chainId: {}", e)))
            })
            .await?;
        if chain_id != config.chain_id {
            return Err(Error::Config(format!(
                "RPC endpoint serves chain {}, expected {}",
                chain_id, config.chain_id
            )));
        }

        info!("Connected to chain {} (router {})", chain_id, router);
        Ok(client)
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.retry_base_delay,
            max_interval: self.retry_base_delay * 4,
            max_elapsed_time: Some(self.max_retry_elapsed),
            ..Default::default()
        }
    }

    /// Run a read-only call, retrying transient RPC failures
    ///
    /// An attempt that outlives the configured timeout counts as transient.
    async fn read<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let timeout = self.timeout;
        retry(self.backoff(), || {
            let attempt = call();
            async move {
                let result = match tokio::time::timeout(timeout, attempt).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::Rpc(format!("read timed out after {:?}", timeout))),
                };
                match result {
                    Ok(value) => Ok(value),
                    Err(e) if e.is_retryable() => {
                        debug!("Retrying read: {}", e);
                        Err(backoff::Error::transient(e))
                    }
                    Err(e) => Err(backoff::Error::permanent(e)),
                }
            }
        })
        .await
    }

    /// Provider that signs with `signer`, layered on the shared transport
    fn signing_provider(&self, signer: &PrivateKeySigner) -> DynProvider {
        DynProvider::new(
            ProviderBuilder::new()
                .wallet(signer.clone())
                .connect_provider(self.provider.clone()),
        )
    }

    /// Wait for inclusion and check the receipt status
    async fn confirm(
        pending: PendingTransactionBuilder<alloy::network::Ethereum>,
        describe: &str,
    ) -> Result<TxHash> {
        let tx_hash = *pending.tx_hash();
        debug!("{} submitted: {}", describe, tx_hash);

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| Error::Rpc(format!("{} receipt: {}", describe, e)))?;
        if !receipt.status() {
            warn!("{} reverted: {}", describe, tx_hash);
            return Err(Error::TransactionReverted(tx_hash.to_string()));
        }
        Ok(receipt.transaction_hash)
    }
}

#[async_trait]
impl FeeOracle for RpcChainClient {
    async fn gas_price(&self) -> Result<u128> {
        self.read(|| async {
            self.provider
                .get_gas_price()
                .await
                .map_err(|e| Error::Rpc(format!("eth_gasPrice: {}", e)))
        })
        .await
    }
}

#[async_trait]
impl TokenContract for RpcChainClient {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        self.read(|| async {
            IERC20::new(token, self.provider.clone())
                .balanceOf(owner)
                .call()
                .await
                .map_err(|e| Error::Rpc(format!("balanceOf: {}", e)))
        })
        .await
    }

    async fn decimals(&self, token: Address) -> Result<u8> {
        self.read(|| async {
            IERC20::new(token, self.provider.clone())
                .decimals()
                .call()
                .await
                .map_err(|e| Error::Rpc(format!("decimals: {}", e)))
        })
        .await
    }

    async fn transfer(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash> {
        let erc20 = IERC20::new(token, self.signing_provider(signer));
        let pending = erc20
            .transfer(to, amount)
            .send()
            .await
            .map_err(|e| Error::Rpc(format!("transfer: {}", e)))?;
        Self::confirm(pending, "Transfer").await
    }
}

#[async_trait]
impl DexRouter for RpcChainClient {
    fn router_address(&self) -> Address {
        self.router
    }

    async fn quote_output(&self, path: &[Address], amount_in: U256) -> Result<U256> {
        let amounts = IJoeRouter::new(self.router, self.provider.clone())
            .getAmountsOut(amount_in, path.to_vec())
            .call()
            .await
            .map_err(|e| Error::Quote(e.to_string()))?;

        amounts
            .last()
            .copied()
            .ok_or_else(|| Error::Quote("router returned no amounts".into()))
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.read(|| async {
            IERC20::new(token, self.provider.clone())
                .allowance(owner, spender)
                .call()
                .await
                .map_err(|e| Error::Rpc(format!("allowance: {}", e)))
        })
        .await
    }

    async fn approve(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash> {
        let erc20 = IERC20::new(token, self.signing_provider(signer));
        let pending = erc20
            .approve(spender, amount)
            .send()
            .await
            .map_err(|e| Error::Approval(e.to_string()))?;
        Self::confirm(pending, "Approval").await
    }

    async fn swap_exact_input(&self, signer: &PrivateKeySigner, call: &SwapCall) -> Result<TxHash> {
        let router = IJoeRouter::new(self.router, self.signing_provider(signer));
        let pending = router
            .swapExactTokensForTokens(
                call.amount_in,
                call.min_amount_out,
                call.path.clone(),
                call.recipient,
                call.deadline,
            )
            .send()
            .await
            .map_err(|e| Error::Swap(e.to_string()))?;
        Self::confirm(pending, "Swap").await
    }
}
