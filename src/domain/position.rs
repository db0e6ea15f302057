//! Position and its lifecycle state machine.
//!
//! `Pending -> Open -> {StopLossHit | TakeProfitHit | TimeSquaredOff |
//! ManualClosed} -> Closed`. The four exit states are terminal: once
//! reached, no further price- or time-driven transitions are accepted;
//! `Closed` only acknowledges the exit downstream.

use crate::domain::signal::Direction;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PositionState {
    Pending,
    Open,
    StopLossHit,
    TakeProfitHit,
    TimeSquaredOff,
    ManualClosed,
    Closed,
}

impl PositionState {
    /// Terminal states accept no further lifecycle transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PositionState::Pending | PositionState::Open)
    }
}

impl fmt::Display for PositionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PositionState::Pending => "pending",
            PositionState::Open => "open",
            PositionState::StopLossHit => "stop-loss-hit",
            PositionState::TakeProfitHit => "take-profit-hit",
            PositionState::TimeSquaredOff => "time-squared-off",
            PositionState::ManualClosed => "manual-closed",
            PositionState::Closed => "closed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub quantity: u32,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub opened_at: NaiveDateTime,
    pub state: PositionState,
    pub last_price: f64,
    pub realized_pnl: f64,
}

impl Position {
    /// Capital committed for this position.
    pub fn notional(&self) -> f64 {
        self.entry_price * self.quantity as f64
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        let diff = match self.direction {
            Direction::Long => price - self.entry_price,
            Direction::Short => self.entry_price - price,
        };
        diff * self.quantity as f64
    }

    /// Price has reached the stop threshold (inclusive).
    pub fn stop_hit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price <= self.stop_loss,
            Direction::Short => price >= self.stop_loss,
        }
    }

    /// Price has reached the take-profit threshold (inclusive).
    pub fn target_hit(&self, price: f64) -> bool {
        match self.direction {
            Direction::Long => price >= self.take_profit,
            Direction::Short => price <= self.take_profit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn opened(direction: Direction) -> Position {
        let (stop, target) = match direction {
            Direction::Long => (97.0, 106.0),
            Direction::Short => (103.0, 94.0),
        };
        Position {
            symbol: "HDFCBANK".into(),
            direction,
            entry_price: 100.0,
            quantity: 50,
            stop_loss: stop,
            take_profit: target,
            opened_at: NaiveDate::from_ymd_opt(2024, 6, 14)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            state: PositionState::Open,
            last_price: 100.0,
            realized_pnl: 0.0,
        }
    }

    #[test]
    fn terminal_classification() {
        assert!(!PositionState::Pending.is_terminal());
        assert!(!PositionState::Open.is_terminal());
        assert!(PositionState::StopLossHit.is_terminal());
        assert!(PositionState::TakeProfitHit.is_terminal());
        assert!(PositionState::TimeSquaredOff.is_terminal());
        assert!(PositionState::ManualClosed.is_terminal());
        assert!(PositionState::Closed.is_terminal());
    }

    #[test]
    fn notional_is_entry_times_quantity() {
        let pos = opened(Direction::Long);
        assert!((pos.notional() - 5000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_long() {
        let pos = opened(Direction::Long);
        assert!((pos.unrealized_pnl(102.0) - 100.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(98.0) - (-100.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_short() {
        let pos = opened(Direction::Short);
        assert!((pos.unrealized_pnl(98.0) - 100.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(102.0) - (-100.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn stop_hit_long_inclusive() {
        let pos = opened(Direction::Long);
        assert!(pos.stop_hit(96.5));
        assert!(pos.stop_hit(97.0));
        assert!(!pos.stop_hit(97.5));
    }

    #[test]
    fn stop_hit_short_inclusive() {
        let pos = opened(Direction::Short);
        assert!(pos.stop_hit(103.5));
        assert!(pos.stop_hit(103.0));
        assert!(!pos.stop_hit(102.5));
    }

    #[test]
    fn target_hit_long_inclusive() {
        let pos = opened(Direction::Long);
        assert!(pos.target_hit(106.0));
        assert!(pos.target_hit(107.0));
        assert!(!pos.target_hit(105.9));
    }

    #[test]
    fn target_hit_short_inclusive() {
        let pos = opened(Direction::Short);
        assert!(pos.target_hit(94.0));
        assert!(pos.target_hit(93.0));
        assert!(!pos.target_hit(94.1));
    }

    #[test]
    fn state_display() {
        assert_eq!(PositionState::TimeSquaredOff.to_string(), "time-squared-off");
        assert_eq!(PositionState::Open.to_string(), "open");
    }
}
