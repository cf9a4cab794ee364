//! Swap execution against a DEX router
//!
//! - [`SwapExecutor`]: one approve/quote/swap/measure sequence per call
//! - [`QuoteResult`]: router quote with a 5% slippage floor

pub mod executor;
pub mod quote;
pub mod types;

pub use executor::{SwapExecution, SwapExecutor, SWAP_DEADLINE_SECS};
pub use quote::{QuoteResult, SLIPPAGE_BPS};
pub use types::{Direction, ForwardOutcome, SwapOrder, SwapReceipt};
