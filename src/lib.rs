//! SwapBot library
//!
//! Multi-wallet ping-pong swap agent for Uniswap-V2 style routers on the
//! Avalanche C-Chain. Keys live in an encrypted vault, swaps rotate across
//! wallets and wait out gas spikes.

pub mod chain;
pub mod cli;
pub mod config;
pub mod error;
pub mod fee_guard;
pub mod registry;
pub mod scheduler;
pub mod trading;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
