//! Multi-wallet swap scheduling

pub mod config;
pub mod runner;
pub mod state;

pub use config::SwapConfiguration;
pub use runner::{RunFailure, RunOutcome, SwapScheduler};
pub use state::{CycleState, RunStatus};
