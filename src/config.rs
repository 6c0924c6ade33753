use std::time::Duration;

use rust_decimal::Decimal;

use crate::ledger::in_memory_ledger::OPENING_BALANCE;

pub const DEFAULT_WORKER_COUNT: usize = 4;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Receive attempts started per queue on every tick.
    pub worker_count: usize,
    pub tick_interval: Duration,
    pub opening_balance: Decimal,
    /// Put an account back on the verification queue when a transfer is
    /// refused because it is not verified yet. Accounts still waiting in the
    /// queue are not added twice.
    pub reverify_unverified: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            tick_interval: DEFAULT_TICK_INTERVAL,
            opening_balance: Decimal::from(OPENING_BALANCE),
            reverify_unverified: true,
        }
    }
}

impl PipelineConfig {
    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_opening_balance(mut self, opening_balance: Decimal) -> Self {
        self.opening_balance = opening_balance;
        self
    }

    pub fn with_reverify_unverified(mut self, reverify_unverified: bool) -> Self {
        self.reverify_unverified = reverify_unverified;
        self
    }
}
