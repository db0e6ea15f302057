//! Daily budget tracking.
//!
//! One instance per trading session, owned by the risk engine and mutated
//! only inside its critical section. Tracks capital committed to open
//! positions and realized P&L; reset at session start.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyBudget {
    pub allocated: f64,
    pub committed: f64,
    pub open_positions: u32,
    pub realized_pnl: f64,
    pub trades_today: u32,
    pub loss_limit_hit: bool,
}

impl DailyBudget {
    pub fn new(allocated: f64) -> Self {
        DailyBudget {
            allocated,
            committed: 0.0,
            open_positions: 0,
            realized_pnl: 0.0,
            trades_today: 0,
            loss_limit_hit: false,
        }
    }

    /// Capital not yet committed to open positions.
    pub fn available(&self) -> f64 {
        self.allocated - self.committed
    }

    /// Commit capital for a new position. Fails (leaving the budget
    /// untouched) when the amount would push committed past allocated.
    #[must_use]
    pub fn try_commit(&mut self, amount: f64) -> bool {
        if amount <= 0.0 || self.committed + amount > self.allocated {
            return false;
        }
        self.committed += amount;
        self.open_positions += 1;
        self.trades_today += 1;
        true
    }

    /// Release a position's committed capital and fold in its realized P&L.
    pub fn release(&mut self, amount: f64, realized: f64) {
        self.committed = (self.committed - amount).max(0.0);
        self.open_positions = self.open_positions.saturating_sub(1);
        self.realized_pnl += realized;
    }

    /// New session: full allocation back, counters cleared.
    pub fn reset(&mut self, allocated: f64) {
        *self = DailyBudget::new(allocated);
    }
}
