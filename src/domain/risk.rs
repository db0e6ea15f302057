//! Risk engine and position lifecycle manager.
//!
//! The only component with shared mutable state (the daily budget and the
//! open-position set). Every transition runs inside one mutex-guarded
//! critical section so a capital or position-count check can never race a
//! concurrent commit. A transition, once begun, runs to its terminal
//! sub-state before the lock is released.

use crate::domain::budget::DailyBudget;
use crate::domain::error::SiftraderError;
use crate::domain::position::{Position, PositionState};
use crate::domain::signal::{Direction, TradeSignal};
use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    pub daily_budget: f64,
    pub risk_per_trade: f64,
    pub max_positions: u32,
    pub atr_stop_mult: f64,
    /// Cap on the ATR-derived stop distance, as a fraction of entry price.
    pub max_stop_distance_pct: f64,
    pub min_reward_risk: f64,
    pub min_signal_strength: f64,
    pub max_daily_loss: f64,
    pub session_open: NaiveTime,
    pub session_close: NaiveTime,
    pub square_off: NaiveTime,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            daily_budget: 10_000.0,
            risk_per_trade: 0.02,
            max_positions: 5,
            atr_stop_mult: 2.0,
            max_stop_distance_pct: 0.03,
            min_reward_risk: 2.0,
            min_signal_strength: 0.5,
            max_daily_loss: 500.0,
            session_open: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            session_close: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            square_off: NaiveTime::from_hms_opt(15, 20, 0).unwrap(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), SiftraderError> {
        let invalid = |key: &str, reason: &str| SiftraderError::ConfigInvalid {
            section: "risk".to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if self.daily_budget <= 0.0 {
            return Err(invalid("daily_budget", "daily_budget must be positive"));
        }
        if self.risk_per_trade <= 0.0 || self.risk_per_trade > 1.0 {
            return Err(invalid("risk_per_trade", "risk_per_trade must be in (0, 1]"));
        }
        if self.max_positions == 0 {
            return Err(invalid("max_positions", "max_positions must be at least 1"));
        }
        if self.atr_stop_mult <= 0.0 {
            return Err(invalid("atr_stop_mult", "atr_stop_mult must be positive"));
        }
        if self.max_stop_distance_pct <= 0.0 || self.max_stop_distance_pct >= 1.0 {
            return Err(invalid(
                "max_stop_distance_pct",
                "max_stop_distance_pct must be in (0, 1)",
            ));
        }
        if self.min_reward_risk <= 0.0 {
            return Err(invalid("min_reward_risk", "min_reward_risk must be positive"));
        }
        if !(0.0..=1.0).contains(&self.min_signal_strength) {
            return Err(invalid(
                "min_signal_strength",
                "min_signal_strength must be in [0, 1]",
            ));
        }
        if self.max_daily_loss <= 0.0 {
            return Err(invalid("max_daily_loss", "max_daily_loss must be positive"));
        }
        if self.session_open >= self.square_off || self.square_off > self.session_close {
            return Err(invalid(
                "square_off_time",
                "session_open < square_off_time <= session_close required",
            ));
        }
        Ok(())
    }
}

/// Why the engine dropped a signal. Reported, never retried in-cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
pub enum RiskReject {
    #[error("budget exceeded: need {required:.2}, have {available:.2}")]
    BudgetExceeded { required: f64, available: f64 },

    #[error("position limit reached: {open}/{max}")]
    PositionLimitReached { open: u32, max: u32 },

    #[error("daily loss limit reached: realized {realized:.2}")]
    LossLimitReached { realized: f64 },

    #[error("signal strength {strength:.2} below minimum {minimum:.2}")]
    StrengthBelowMinimum { strength: f64, minimum: f64 },

    #[error("computed risk per share too small to size")]
    RiskTooSmall,

    #[error("outside entry window")]
    MarketClosed,

    #[error("position already open for {symbol}")]
    AlreadyOpen { symbol: String },
}

/// Lifecycle event emitted for every monitoring outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PositionEvent {
    Opened(Position),
    Held(Position),
    StopLossHit(Position),
    TakeProfitHit(Position),
    TimeSquaredOff(Position),
    ManualClosed(Position),
}

impl PositionEvent {
    pub fn position(&self) -> &Position {
        match self {
            PositionEvent::Opened(p)
            | PositionEvent::Held(p)
            | PositionEvent::StopLossHit(p)
            | PositionEvent::TakeProfitHit(p)
            | PositionEvent::TimeSquaredOff(p)
            | PositionEvent::ManualClosed(p) => p,
        }
    }

    pub fn is_exit(&self) -> bool {
        !matches!(self, PositionEvent::Opened(_) | PositionEvent::Held(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskSummary {
    pub realized_pnl: f64,
    pub committed: f64,
    pub available: f64,
    pub open_count: u32,
    pub closed_count: usize,
    pub trades_today: u32,
    pub loss_limit_hit: bool,
    pub loss_capacity_remaining: f64,
}

#[derive(Debug)]
struct RiskState {
    budget: DailyBudget,
    open: HashMap<String, Position>,
    closed: Vec<Position>,
}

#[derive(Debug)]
pub struct RiskEngine {
    cfg: RiskConfig,
    state: Mutex<RiskState>,
}

impl RiskEngine {
    pub fn new(cfg: RiskConfig) -> Result<Self, SiftraderError> {
        cfg.validate()?;
        let budget = DailyBudget::new(cfg.daily_budget);
        Ok(RiskEngine {
            cfg,
            state: Mutex::new(RiskState {
                budget,
                open: HashMap::new(),
                closed: Vec::new(),
            }),
        })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.cfg
    }

    fn state(&self) -> MutexGuard<'_, RiskState> {
        // a panic mid-transition cannot leave partial state (transitions
        // mutate through whole-value updates), so poison is recoverable
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// The `Pending -> Open` check: sizing plus capital and position-count
    /// admission, atomically. A rejected signal is dropped for the cycle.
    pub fn evaluate_signal(
        &self,
        signal: &TradeSignal,
        now: NaiveDateTime,
    ) -> Result<Position, RiskReject> {
        let mut state = self.state();

        let time = now.time();
        if time < self.cfg.session_open || time >= self.cfg.square_off {
            return Err(RiskReject::MarketClosed);
        }
        if state.budget.loss_limit_hit || state.budget.realized_pnl <= -self.cfg.max_daily_loss {
            state.budget.loss_limit_hit = true;
            return Err(RiskReject::LossLimitReached {
                realized: state.budget.realized_pnl,
            });
        }
        if signal.strength < self.cfg.min_signal_strength {
            return Err(RiskReject::StrengthBelowMinimum {
                strength: signal.strength,
                minimum: self.cfg.min_signal_strength,
            });
        }
        if state.open.contains_key(&signal.symbol) {
            return Err(RiskReject::AlreadyOpen {
                symbol: signal.symbol.clone(),
            });
        }

        let entry = signal.entry_price;
        let stop_distance = (self.cfg.atr_stop_mult * signal.atr)
            .min(self.cfg.max_stop_distance_pct * entry);
        if stop_distance <= 0.0 || entry <= 0.0 {
            return Err(RiskReject::RiskTooSmall);
        }
        let quantity =
            ((state.budget.allocated * self.cfg.risk_per_trade) / stop_distance).floor() as u32;
        if quantity == 0 {
            return Err(RiskReject::RiskTooSmall);
        }

        let open_count = state.budget.open_positions;
        if open_count >= self.cfg.max_positions {
            return Err(RiskReject::PositionLimitReached {
                open: open_count,
                max: self.cfg.max_positions,
            });
        }

        let (stop_loss, take_profit) = match signal.direction {
            Direction::Long => (
                entry - stop_distance,
                entry + self.cfg.min_reward_risk * stop_distance,
            ),
            Direction::Short => (
                entry + stop_distance,
                entry - self.cfg.min_reward_risk * stop_distance,
            ),
        };

        let mut position = Position {
            symbol: signal.symbol.clone(),
            direction: signal.direction,
            entry_price: entry,
            quantity,
            stop_loss,
            take_profit,
            opened_at: now,
            state: PositionState::Pending,
            last_price: entry,
            realized_pnl: 0.0,
        };

        let notional = position.notional();
        if !state.budget.try_commit(notional) {
            return Err(RiskReject::BudgetExceeded {
                required: notional,
                available: state.budget.available(),
            });
        }

        position.state = PositionState::Open;
        state.open.insert(position.symbol.clone(), position.clone());
        Ok(position)
    }

    /// Terminal-transition checks for one open position, called once per
    /// monitoring tick. `latest = None` marks a stale or malformed price
    /// read: the position holds its last known state, except that the
    /// time-based square-off always fires using the last known price.
    pub fn advance_position(
        &self,
        symbol: &str,
        latest: Option<f64>,
        now: NaiveDateTime,
    ) -> Result<PositionEvent, SiftraderError> {
        let mut state = self.state();

        if !state.open.contains_key(symbol) {
            if let Some(closed) = state.closed.iter().find(|p| p.symbol == symbol) {
                return Err(SiftraderError::PositionNotOpen {
                    symbol: symbol.to_string(),
                    state: closed.state.to_string(),
                });
            }
            return Err(SiftraderError::UnknownPosition {
                symbol: symbol.to_string(),
            });
        }

        let past_cutoff = now.time() >= self.cfg.square_off;
        let fresh = latest.filter(|p| p.is_finite() && *p > 0.0);

        // decide first with a scoped borrow, then perform the transition
        let mut exit: Option<(f64, PositionState)> = None;
        if let Some(position) = state.open.get_mut(symbol) {
            match fresh {
                Some(price) => {
                    position.last_price = price;
                    if position.stop_hit(price) {
                        exit = Some((price, PositionState::StopLossHit));
                    } else if position.target_hit(price) {
                        exit = Some((price, PositionState::TakeProfitHit));
                    } else if past_cutoff {
                        exit = Some((price, PositionState::TimeSquaredOff));
                    }
                }
                None => {
                    if past_cutoff {
                        exit = Some((position.last_price, PositionState::TimeSquaredOff));
                    }
                }
            }
        }

        let event = match exit {
            None => PositionEvent::Held(state.open[symbol].clone()),
            Some((price, new_state)) => {
                let closed =
                    Self::close_at(&mut state, symbol, price, new_state, self.cfg.max_daily_loss)
                        .ok_or_else(|| SiftraderError::UnknownPosition {
                            symbol: symbol.to_string(),
                        })?;
                match new_state {
                    PositionState::StopLossHit => PositionEvent::StopLossHit(closed),
                    PositionState::TakeProfitHit => PositionEvent::TakeProfitHit(closed),
                    _ => PositionEvent::TimeSquaredOff(closed),
                }
            }
        };
        Ok(event)
    }

    /// Close one open position at its last known price (manual intervention).
    pub fn close(&self, symbol: &str) -> Result<PositionEvent, SiftraderError> {
        let mut state = self.state();
        let price = match state.open.get(symbol) {
            Some(position) => position.last_price,
            None => {
                return Err(SiftraderError::UnknownPosition {
                    symbol: symbol.to_string(),
                })
            }
        };
        let closed = Self::close_at(
            &mut state,
            symbol,
            price,
            PositionState::ManualClosed,
            self.cfg.max_daily_loss,
        )
        .ok_or_else(|| SiftraderError::UnknownPosition {
            symbol: symbol.to_string(),
        })?;
        Ok(PositionEvent::ManualClosed(closed))
    }

    /// Emergency square-off: close every open position at its last known
    /// price.
    pub fn close_all(&self) -> Vec<PositionEvent> {
        let mut state = self.state();
        let symbols: Vec<String> = state.open.keys().cloned().collect();
        let mut events = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let price = match state.open.get(&symbol) {
                Some(position) => position.last_price,
                None => continue,
            };
            if let Some(closed) = Self::close_at(
                &mut state,
                &symbol,
                price,
                PositionState::ManualClosed,
                self.cfg.max_daily_loss,
            ) {
                events.push(PositionEvent::ManualClosed(closed));
            }
        }
        events
    }

    /// Downstream acknowledgment that a terminal exit has been handled;
    /// flips the record to `Closed`.
    pub fn acknowledge(&self, symbol: &str) -> Result<Position, SiftraderError> {
        let mut state = self.state();
        let Some(position) = state
            .closed
            .iter_mut()
            .find(|p| p.symbol == symbol && p.state != PositionState::Closed)
        else {
            return Err(SiftraderError::UnknownPosition {
                symbol: symbol.to_string(),
            });
        };
        position.state = PositionState::Closed;
        Ok(position.clone())
    }

    pub fn open_positions(&self) -> Vec<Position> {
        let state = self.state();
        let mut positions: Vec<Position> = state.open.values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        positions
    }

    pub fn budget(&self) -> DailyBudget {
        self.state().budget.clone()
    }

    pub fn summary(&self) -> RiskSummary {
        let state = self.state();
        RiskSummary {
            realized_pnl: state.budget.realized_pnl,
            committed: state.budget.committed,
            available: state.budget.available(),
            open_count: state.budget.open_positions,
            closed_count: state.closed.len(),
            trades_today: state.budget.trades_today,
            loss_limit_hit: state.budget.loss_limit_hit,
            loss_capacity_remaining: (self.cfg.max_daily_loss + state.budget.realized_pnl)
                .max(0.0),
        }
    }

    /// New trading session: budget restored, position books cleared.
    pub fn reset_session(&self) {
        let mut state = self.state();
        state.budget.reset(self.cfg.daily_budget);
        state.open.clear();
        state.closed.clear();
    }

    /// Terminal transition: capital release, count decrement and realized
    /// P&L accrual happen together with the state change, under the caller's
    /// lock.
    fn close_at(
        state: &mut RiskState,
        symbol: &str,
        exit_price: f64,
        new_state: PositionState,
        max_daily_loss: f64,
    ) -> Option<Position> {
        let mut position = state.open.remove(symbol)?;
        let realized = position.unrealized_pnl(exit_price);
        position.last_price = exit_price;
        position.realized_pnl = realized;
        position.state = new_state;

        state.budget.release(position.notional(), realized);
        if state.budget.realized_pnl <= -max_daily_loss {
            state.budget.loss_limit_hit = true;
        }

        state.closed.push(position.clone());
        Some(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn signal(symbol: &str, entry: f64, atr: f64) -> TradeSignal {
        TradeSignal {
            symbol: symbol.into(),
            direction: Direction::Long,
            strength: 0.8,
            reasons: vec!["EMA bullish crossover".into()],
            entry_price: entry,
            atr,
            generated_at: noon(),
        }
    }

    fn engine(budget: f64) -> RiskEngine {
        RiskEngine::new(RiskConfig {
            daily_budget: budget,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn sizing_follows_risk_budget() {
        // allocated 50_000, risk 0.02, entry 100, ATR 1.5 -> stop distance 3
        // quantity = floor(1000 / 3) = 333
        let engine = engine(50_000.0);
        let position = engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();

        assert_eq!(position.quantity, 333);
        assert!((position.stop_loss - 97.0).abs() < 1e-9);
        // 2:1 reward:risk
        assert!((position.take_profit - 106.0).abs() < 1e-9);
        assert_eq!(position.state, PositionState::Open);

        let budget = engine.budget();
        assert!((budget.committed - 33_300.0).abs() < 1e-9);
    }

    #[test]
    fn stop_distance_capped_at_max_pct() {
        let engine = engine(50_000.0);
        // ATR so large the 3% cap binds: distance = 3.0 despite 2*10=20
        let position = engine.evaluate_signal(&signal("TCS", 100.0, 10.0), noon()).unwrap();
        assert!((position.stop_loss - 97.0).abs() < 1e-9);
    }

    #[test]
    fn budget_exceeded_rejects_whole_signal() {
        // first entry commits 33_300 of 50_000; an identical second signal
        // sizes to another 33_300, which no longer fits, and is dropped
        // whole rather than downsized
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("AAA", 100.0, 1.5), noon()).unwrap(); // 33_300
        let err = engine.evaluate_signal(&signal("BBB", 100.0, 1.5), noon()).unwrap_err();
        assert!(matches!(err, RiskReject::BudgetExceeded { required, .. } if required > 0.0));

        // invariant held
        let budget = engine.budget();
        assert!(budget.committed <= budget.allocated + 1e-9);
    }

    #[test]
    fn position_limit_enforced() {
        // wide stops keep each notional small so the count limit binds
        // before the capital limit
        let engine = RiskEngine::new(RiskConfig {
            daily_budget: 1_000_000.0,
            max_positions: 2,
            max_stop_distance_pct: 0.30,
            max_daily_loss: 50_000.0,
            ..Default::default()
        })
        .unwrap();

        engine.evaluate_signal(&signal("AAA", 100.0, 15.0), noon()).unwrap();
        engine.evaluate_signal(&signal("BBB", 100.0, 15.0), noon()).unwrap();
        let err = engine.evaluate_signal(&signal("CCC", 100.0, 15.0), noon()).unwrap_err();
        assert_eq!(err, RiskReject::PositionLimitReached { open: 2, max: 2 });
    }

    #[test]
    fn weak_signal_rejected() {
        let engine = engine(50_000.0);
        let mut weak = signal("TCS", 100.0, 1.5);
        weak.strength = 0.3;
        let err = engine.evaluate_signal(&weak, noon()).unwrap_err();
        assert!(matches!(err, RiskReject::StrengthBelowMinimum { .. }));
    }

    #[test]
    fn duplicate_symbol_rejected() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();
        let err = engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap_err();
        assert!(matches!(err, RiskReject::AlreadyOpen { .. }));
    }

    #[test]
    fn entries_blocked_outside_window() {
        let engine = engine(50_000.0);
        assert_eq!(
            engine.evaluate_signal(&signal("TCS", 100.0, 1.5), at(9, 0)).unwrap_err(),
            RiskReject::MarketClosed
        );
        // at or after square-off, no fresh entries
        assert_eq!(
            engine.evaluate_signal(&signal("TCS", 100.0, 1.5), at(15, 20)).unwrap_err(),
            RiskReject::MarketClosed
        );
    }

    #[test]
    fn zero_atr_rejected_as_unsizable() {
        let engine = engine(50_000.0);
        let err = engine.evaluate_signal(&signal("TCS", 100.0, 0.0), noon()).unwrap_err();
        assert_eq!(err, RiskReject::RiskTooSmall);
    }

    #[test]
    fn stop_loss_transition_releases_capital() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();

        let event = engine.advance_position("TCS", Some(96.5), at(12, 30)).unwrap();
        let PositionEvent::StopLossHit(position) = event else {
            panic!("expected StopLossHit, got {event:?}");
        };
        assert_eq!(position.state, PositionState::StopLossHit);
        assert!((position.realized_pnl - (96.5 - 100.0) * 333.0).abs() < 1e-9);

        let budget = engine.budget();
        assert!(budget.committed.abs() < 1e-9);
        assert_eq!(budget.open_positions, 0);
    }

    #[test]
    fn take_profit_transition() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();

        let event = engine.advance_position("TCS", Some(106.2), at(12, 30)).unwrap();
        assert!(matches!(event, PositionEvent::TakeProfitHit(_)));
        assert!(event.position().realized_pnl > 0.0);
    }

    #[test]
    fn in_range_price_holds() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();

        let event = engine.advance_position("TCS", Some(101.0), at(12, 30)).unwrap();
        assert!(matches!(event, PositionEvent::Held(_)));
        assert_eq!(engine.open_positions().len(), 1);
    }

    #[test]
    fn time_square_off_fires_regardless_of_pnl() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();

        let event = engine.advance_position("TCS", Some(101.0), at(15, 20)).unwrap();
        assert!(matches!(event, PositionEvent::TimeSquaredOff(_)));
    }

    #[test]
    fn stale_price_holds_until_cutoff() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();

        // stale mid-session: defer
        let event = engine.advance_position("TCS", None, at(12, 30)).unwrap();
        assert!(matches!(event, PositionEvent::Held(_)));

        // stale at cutoff: forced exit at last known price
        engine.advance_position("TCS", Some(99.0), at(12, 35)).unwrap();
        let event = engine.advance_position("TCS", None, at(15, 25)).unwrap();
        let PositionEvent::TimeSquaredOff(position) = event else {
            panic!("expected TimeSquaredOff");
        };
        assert!((position.last_price - 99.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_price_treated_as_stale() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();
        let event = engine.advance_position("TCS", Some(f64::NAN), at(12, 30)).unwrap();
        assert!(matches!(event, PositionEvent::Held(_)));
    }

    #[test]
    fn terminal_positions_accept_no_further_transitions() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();
        engine.advance_position("TCS", Some(96.5), at(12, 30)).unwrap();

        let err = engine.advance_position("TCS", Some(90.0), at(12, 35)).unwrap_err();
        assert!(matches!(err, SiftraderError::PositionNotOpen { .. }));
    }

    #[test]
    fn unknown_symbol_reported() {
        let engine = engine(50_000.0);
        let err = engine.advance_position("NOPE", Some(100.0), noon()).unwrap_err();
        assert!(matches!(err, SiftraderError::UnknownPosition { .. }));
    }

    #[test]
    fn manual_close_and_close_all() {
        let engine = RiskEngine::new(RiskConfig {
            daily_budget: 200_000.0,
            max_stop_distance_pct: 0.30,
            max_daily_loss: 10_000.0,
            ..Default::default()
        })
        .unwrap();
        engine.evaluate_signal(&signal("AAA", 100.0, 15.0), noon()).unwrap();
        engine.evaluate_signal(&signal("BBB", 200.0, 30.0), noon()).unwrap();

        let event = engine.close("AAA").unwrap();
        assert!(matches!(event, PositionEvent::ManualClosed(_)));

        let events = engine.close_all();
        assert_eq!(events.len(), 1);
        assert_eq!(engine.open_positions().len(), 0);
        assert!(engine.budget().committed.abs() < 1e-9);
    }

    #[test]
    fn acknowledge_marks_closed() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();
        engine.advance_position("TCS", Some(96.5), at(12, 30)).unwrap();

        let position = engine.acknowledge("TCS").unwrap();
        assert_eq!(position.state, PositionState::Closed);
        assert!(engine.acknowledge("TCS").is_err());
    }

    #[test]
    fn loss_limit_blocks_new_entries() {
        let engine = RiskEngine::new(RiskConfig {
            daily_budget: 50_000.0,
            max_daily_loss: 500.0,
            ..Default::default()
        })
        .unwrap();
        engine.evaluate_signal(&signal("AAA", 100.0, 1.5), noon()).unwrap();
        // stop out: loss = 3.5 * 333 = 1165.5 > 500
        engine.advance_position("AAA", Some(96.5), at(12, 30)).unwrap();

        let err = engine.evaluate_signal(&signal("BBB", 50.0, 1.0), at(12, 35)).unwrap_err();
        assert!(matches!(err, RiskReject::LossLimitReached { .. }));
        assert!(engine.summary().loss_limit_hit);
    }

    #[test]
    fn summary_reflects_session() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();
        let summary = engine.summary();
        assert_eq!(summary.open_count, 1);
        assert!((summary.committed - 33_300.0).abs() < 1e-9);
        assert!((summary.available - 16_700.0).abs() < 1e-9);
        assert_eq!(summary.trades_today, 1);
    }

    #[test]
    fn reset_session_clears_books() {
        let engine = engine(50_000.0);
        engine.evaluate_signal(&signal("TCS", 100.0, 1.5), noon()).unwrap();
        engine.advance_position("TCS", Some(96.5), at(12, 30)).unwrap();

        engine.reset_session();
        let summary = engine.summary();
        assert_eq!(summary.open_count, 0);
        assert_eq!(summary.closed_count, 0);
        assert!(summary.realized_pnl.abs() < f64::EPSILON);
        assert!(!summary.loss_limit_hit);
    }

    #[test]
    fn short_position_lifecycle() {
        let engine = engine(50_000.0);
        let mut sig = signal("SBIN", 200.0, 2.0);
        sig.direction = Direction::Short;
        let position = engine.evaluate_signal(&sig, noon()).unwrap();

        // stop 200 + 4 = 204, target 200 - 8 = 192
        assert!((position.stop_loss - 204.0).abs() < 1e-9);
        assert!((position.take_profit - 192.0).abs() < 1e-9);

        let event = engine.advance_position("SBIN", Some(191.0), at(13, 0)).unwrap();
        assert!(matches!(event, PositionEvent::TakeProfitHit(_)));
        assert!(event.position().realized_pnl > 0.0);
    }

    #[test]
    fn concurrent_signals_never_overcommit() {
        use std::sync::Arc;

        let engine = Arc::new(
            RiskEngine::new(RiskConfig {
                daily_budget: 50_000.0,
                max_positions: 100,
                max_stop_distance_pct: 0.30,
                max_daily_loss: 10_000.0,
                ..Default::default()
            })
            .unwrap(),
        );

        // each position commits ~3_300 of 50_000, so most threads race for
        // real capacity and the last ones must be refused consistently
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    let sig = signal(&format!("SYM{i:02}"), 100.0, 15.0);
                    let _ = engine.evaluate_signal(&sig, noon());
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let budget = engine.budget();
        assert!(
            budget.committed <= budget.allocated + 1e-9,
            "committed {} exceeds allocated {}",
            budget.committed,
            budget.allocated
        );
        assert_eq!(budget.open_positions as usize, engine.open_positions().len());
    }
}
