//! In-memory chain for tests
//!
//! Simulates an ERC-20 ledger and a constant-rate router. Output can be
//! reduced by a transfer fee or diverted away from the recipient to model
//! tokens whose delivered amount differs from the quote.

use std::collections::HashMap;

use alloy::primitives::{Address, TxHash, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::chain::{DexRouter, FeeOracle, SwapCall, TokenContract};
use crate::error::{Error, Result};

pub const ROUTER: Address = Address::repeat_byte(0xEE);
pub const SINK: Address = Address::repeat_byte(0xDD);

#[derive(Debug, Default)]
pub struct Ledger {
    pub balances: HashMap<(Address, Address), U256>,
    pub allowances: HashMap<(Address, Address, Address), U256>,
    /// (from, to) -> (numerator, denominator)
    pub rates: HashMap<(Address, Address), (u64, u64)>,
    pub gas_price_wei: u128,
    pub transfer_fee_bps: u64,
    pub divert_output: bool,
    pub fail_quotes: bool,
    pub fail_swaps: bool,
    pub fail_transfers: bool,
    pub fail_gas_reads: bool,
    pub approvals: Vec<(Address, Address, U256)>,
    pub swaps: Vec<SwapCall>,
    pub transfers: Vec<(Address, Address, Address, U256)>,
    tx_counter: u8,
}

impl Ledger {
    fn next_hash(&mut self) -> TxHash {
        self.tx_counter = self.tx_counter.wrapping_add(1);
        TxHash::with_last_byte(self.tx_counter)
    }

    fn balance(&self, token: Address, owner: Address) -> U256 {
        self.balances.get(&(token, owner)).copied().unwrap_or_default()
    }

    fn move_tokens(&mut self, token: Address, from: Address, to: Address, amount: U256) -> bool {
        let available = self.balance(token, from);
        if available < amount {
            return false;
        }
        self.balances.insert((token, from), available - amount);
        let credited = self.balance(token, to) + amount;
        self.balances.insert((token, to), credited);
        true
    }

    fn quote(&self, from: Address, to: Address, amount_in: U256) -> Option<U256> {
        self.rates
            .get(&(from, to))
            .map(|(num, den)| amount_in * U256::from(*num) / U256::from(*den))
    }
}

#[derive(Default)]
pub struct MockChain {
    pub ledger: Mutex<Ledger>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fund(&self, token: Address, owner: Address, amount: U256) {
        let mut ledger = self.ledger.lock().await;
        let current = ledger.balance(token, owner);
        ledger.balances.insert((token, owner), current + amount);
    }

    /// Router pays `num/den` of `to` per unit of `from`
    pub async fn set_rate(&self, from: Address, to: Address, num: u64, den: u64) {
        self.ledger.lock().await.rates.insert((from, to), (num, den));
    }

    pub async fn set_gas_price(&self, wei: u128) {
        self.ledger.lock().await.gas_price_wei = wei;
    }

    pub async fn balance(&self, token: Address, owner: Address) -> U256 {
        self.ledger.lock().await.balance(token, owner)
    }
}

#[async_trait]
impl FeeOracle for MockChain {
    async fn gas_price(&self) -> Result<u128> {
        let ledger = self.ledger.lock().await;
        if ledger.fail_gas_reads {
            return Err(Error::Rpc("gas price unavailable".into()));
        }
        Ok(ledger.gas_price_wei)
    }
}

#[async_trait]
impl TokenContract for MockChain {
    async fn balance_of(&self, token: Address, owner: Address) -> Result<U256> {
        Ok(self.balance(token, owner).await)
    }

    async fn decimals(&self, _token: Address) -> Result<u8> {
        Ok(18)
    }

    async fn transfer(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash> {
        let mut ledger = self.ledger.lock().await;
        if ledger.fail_transfers {
            return Err(Error::TransactionReverted("transfer".into()));
        }
        if !ledger.move_tokens(token, signer.address(), to, amount) {
            return Err(Error::TransactionReverted("transfer amount exceeds balance".into()));
        }
        ledger.transfers.push((token, signer.address(), to, amount));
        Ok(ledger.next_hash())
    }
}

#[async_trait]
impl DexRouter for MockChain {
    fn router_address(&self) -> Address {
        ROUTER
    }

    async fn quote_output(&self, path: &[Address], amount_in: U256) -> Result<U256> {
        let ledger = self.ledger.lock().await;
        if ledger.fail_quotes {
            return Err(Error::Quote("execution reverted".into()));
        }
        match path {
            [from, to] => ledger
                .quote(*from, *to, amount_in)
                .ok_or_else(|| Error::Quote("no pair".into())),
            _ => Err(Error::Quote("unsupported path".into())),
        }
    }

    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn approve(
        &self,
        signer: &PrivateKeySigner,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash> {
        let mut ledger = self.ledger.lock().await;
        ledger
            .allowances
            .insert((token, signer.address(), spender), amount);
        ledger.approvals.push((token, signer.address(), amount));
        Ok(ledger.next_hash())
    }

    async fn swap_exact_input(&self, signer: &PrivateKeySigner, call: &SwapCall) -> Result<TxHash> {
        let mut ledger = self.ledger.lock().await;
        if ledger.fail_swaps {
            return Err(Error::Swap("execution reverted".into()));
        }
        let &[from, to] = call.path.as_slice() else {
            return Err(Error::Swap("unsupported path".into()));
        };
        let owner = signer.address();

        let allowance = ledger
            .allowances
            .get(&(from, owner, ROUTER))
            .copied()
            .unwrap_or_default();
        if allowance < call.amount_in {
            return Err(Error::Swap("TRANSFER_FROM_FAILED".into()));
        }

        let quoted = ledger
            .quote(from, to, call.amount_in)
            .ok_or_else(|| Error::Swap("no pair".into()))?;
        if quoted < call.min_amount_out {
            return Err(Error::Swap("INSUFFICIENT_OUTPUT_AMOUNT".into()));
        }
        if !ledger.move_tokens(from, owner, ROUTER, call.amount_in) {
            return Err(Error::Swap("TRANSFER_FROM_FAILED".into()));
        }

        let delivered = quoted * U256::from(10_000 - ledger.transfer_fee_bps) / U256::from(10_000);
        let destination = if ledger.divert_output { SINK } else { call.recipient };
        let credited = ledger.balance(to, destination) + delivered;
        ledger.balances.insert((to, destination), credited);

        if allowance != U256::MAX {
            ledger
                .allowances
                .insert((from, owner, ROUTER), allowance - call.amount_in);
        }
        ledger.swaps.push(call.clone());
        Ok(ledger.next_hash())
    }
}
