//! Blockchain boundary
//!
//! Everything that talks to the network goes through three narrow traits so
//! the fee guard, executor and scheduler can be driven by a simulated chain
//! in tests:
//! - [`FeeOracle`]: current gas price
//! - [`TokenContract`]: ERC-20 reads and transfers
//! - [`DexRouter`]: router quotes, allowances and swaps
//!
//! [`RpcChainClient`] implements all three over an alloy HTTP provider.

pub mod abi;
#[cfg(test)]
pub mod mock;
pub mod rpc;
pub mod units;

use alloy::primitives::{Address, TxHash, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::error::Result;

pub use rpc::RpcChainClient;

/// Source of the current network gas price
#[async_trait]
pub trait FeeOracle: Send + Sync {
    /// Gas price in wei
    async fn gas_price(&self) -> Result<u128>;
}

/// ERC-20 token operations
#[async_trait]
pub trait TokenContract: Send + Sync {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256>;

    async fn decimals(&self, token: Address) -> Result<u8>;

    /// Send `amount` of `token` from the signer to `to` and wait for inclusion
    async fn transfer(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash>;
}

/// Arguments of a `swapExactTokensForTokens` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapCall {
    pub amount_in: U256,
    pub min_amount_out: U256,
    pub path: Vec<Address>,
    pub recipient: Address,
    /// Unix timestamp after which the router rejects the swap
    pub deadline: U256,
}

/// Uniswap-V2 style router operations
#[async_trait]
pub trait DexRouter: Send + Sync {
    /// Router contract address (the spender for approvals)
    fn router_address(&self) -> Address;

    /// Expected output of swapping `amount_in` along `path`
    async fn quote_output(&self, path: &[Address], amount_in: U256) -> Result<U256>;

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256>;

    /// Approve `spender` and wait for inclusion
    async fn approve(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash>;

    /// Submit the swap and wait for inclusion
    async fn swap_exact_input(&self, signer: &PrivateKeySigner, call: &SwapCall)
        -> Result<TxHash>;
}

/// Everything the swap executor needs
pub trait ChainClient: TokenContract + DexRouter {}

impl<T: TokenContract + DexRouter> ChainClient for T {}
