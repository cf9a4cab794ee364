//! Types shared by the executor and the scheduler

use std::fmt;

use alloy::primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::trading::quote::QuoteResult;
use crate::wallet::Secret;

/// Which leg of the pair a cycle trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// input token -> output token
    Forward,
    /// output token -> input token
    Reverse,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }

    /// Outbound legs are the ones whose proceeds may be forwarded
    pub fn is_outbound(self) -> bool {
        self == Direction::Forward
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// One swap to execute from one wallet
#[derive(Debug, Clone)]
pub struct SwapOrder<'a> {
    pub secret: &'a Secret,
    pub from_token: Address,
    pub to_token: Address,
    /// Raw units of `from_token`
    pub amount: U256,
    pub direction: Direction,
    /// Treasury wallet receiving outbound proceeds
    pub forward_to: Option<Address>,
}

/// What happened to the proceeds after a swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    Sent { to: Address, tx_hash: TxHash },
    /// The swap itself succeeded; only the follow-up transfer failed
    Failed { to: Address, reason: String },
}

/// Outcome of a completed swap
#[derive(Debug, Clone)]
pub struct SwapReceipt {
    pub tx_hash: TxHash,
    pub wallet: Address,
    pub quote: QuoteResult,
    /// Measured balance increase of the output token
    pub actually_received: U256,
    pub forward: Option<ForwardOutcome>,
}
