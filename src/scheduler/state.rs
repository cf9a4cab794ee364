//! Progress of a swap run
//!
//! Only the scheduler task mutates `CycleState`. Everyone else reads
//! snapshots.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scheduler::config::SwapConfiguration;
use crate::trading::Direction;

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Stopped,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Stopped | RunStatus::Failed
        )
    }
}

/// Observable progress of the current or last run
#[derive(Debug, Clone, Serialize)]
pub struct CycleState {
    pub status: RunStatus,
    pub is_running: bool,
    pub executed_count: u64,
    pub target_count: u64,
    pub direction: Direction,
    pub active_wallet_index: usize,
    /// Measured output of the last swap, input for the next one
    pub last_amount_carried: U256,
    pub last_execution: Option<DateTime<Utc>>,
    /// Ticks skipped because gas was at or above the ceiling
    pub fee_delays: u64,
    pub last_error: Option<String>,
}

impl Default for CycleState {
    fn default() -> Self {
        Self {
            status: RunStatus::Idle,
            is_running: false,
            executed_count: 0,
            target_count: 0,
            direction: Direction::Forward,
            active_wallet_index: 0,
            last_amount_carried: U256::ZERO,
            last_execution: None,
            fee_delays: 0,
            last_error: None,
        }
    }
}

impl CycleState {
    /// Fresh state for a new run
    pub fn begin(config: &SwapConfiguration) -> Self {
        Self {
            status: RunStatus::Running,
            is_running: true,
            target_count: config.target_count(),
            last_amount_carried: config.per_cycle_amount,
            ..Self::default()
        }
    }

    pub fn is_complete(&self) -> bool {
        self.executed_count >= self.target_count
    }

    /// Amount to swap in the next cycle
    pub fn amount_to_use(&self, config: &SwapConfiguration) -> U256 {
        if config.is_fixed_leg() {
            config.per_cycle_amount
        } else {
            self.last_amount_carried
        }
    }

    /// Record a successful swap and advance rotation
    ///
    /// Returns true once the run has reached its target.
    pub fn record_success(&mut self, received: U256, wallet_count: usize, fixed_leg: bool) -> bool {
        self.executed_count += 1;
        self.last_execution = Some(Utc::now());
        if !fixed_leg {
            self.last_amount_carried = received;
            self.direction = self.direction.opposite();
        }
        if wallet_count > 0 {
            self.active_wallet_index = (self.active_wallet_index + 1) % wallet_count;
        }

        let complete = self.is_complete();
        if complete && self.status == RunStatus::Running {
            self.status = RunStatus::Completed;
            self.is_running = false;
        }
        complete
    }

    pub fn record_fee_delay(&mut self) {
        self.fee_delays += 1;
    }

    /// Terminal failure; the cause stays visible
    pub fn fail(&mut self, error: String) {
        self.status = RunStatus::Failed;
        self.is_running = false;
        self.last_error = Some(error);
    }

    /// Operator stop. A run that already ended keeps its status.
    pub fn halt(&mut self) {
        if !self.status.is_terminal() {
            self.status = RunStatus::Stopped;
        }
        self.is_running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::config::fixtures::config;

    #[test]
    fn test_ping_pong_progression() {
        let config = config(2, None);
        let mut state = CycleState::begin(&config);
        assert_eq!(state.last_amount_carried, U256::from(100u64));
        assert_eq!(state.amount_to_use(&config), U256::from(100u64));

        assert!(!state.record_success(U256::from(50u64), 2, false));
        assert_eq!(state.direction, Direction::Reverse);
        assert_eq!(state.active_wallet_index, 1);
        assert_eq!(state.amount_to_use(&config), U256::from(50u64));

        state.record_success(U256::from(99u64), 2, false);
        assert_eq!(state.direction, Direction::Forward);
        assert_eq!(state.active_wallet_index, 0);
        assert_eq!(state.amount_to_use(&config), U256::from(99u64));
    }

    #[test]
    fn test_fixed_leg_never_flips() {
        let config = config(2, Some(alloy::primitives::Address::repeat_byte(0xAA)));
        let mut state = CycleState::begin(&config);

        state.record_success(U256::from(500u64), 3, true);
        state.record_success(U256::from(700u64), 3, true);
        assert_eq!(state.direction, Direction::Forward);
        assert_eq!(state.active_wallet_index, 2);
        assert_eq!(state.amount_to_use(&config), U256::from(100u64));
    }

    #[test]
    fn test_completion_at_target() {
        let config = config(1, None);
        let mut state = CycleState::begin(&config);
        assert_eq!(state.target_count, 2);

        assert!(!state.record_success(U256::from(1u64), 1, false));
        assert!(state.record_success(U256::from(1u64), 1, false));
        assert_eq!(state.status, RunStatus::Completed);
        assert!(!state.is_running);
    }

    #[test]
    fn test_halt_keeps_terminal_status() {
        let config = config(1, None);
        let mut state = CycleState::begin(&config);
        state.fail("boom".into());
        state.halt();
        assert_eq!(state.status, RunStatus::Failed);

        let mut running = CycleState::begin(&config);
        running.halt();
        assert_eq!(running.status, RunStatus::Stopped);
        assert!(!running.is_running);
    }
}
