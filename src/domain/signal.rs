//! Trade signal generation from technical snapshots.
//!
//! At most one signal per instrument per cycle:
//! - Long: EMA(fast) crosses above EMA(slow), RSI below the overbought line,
//!   and the latest volume confirms.
//! - Short: the mirrored conditions.
//! Signals at RSI extremes are vetoed outright regardless of direction.

use crate::domain::snapshot::{IndicatorParams, TechnicalSnapshot};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// Fast/slow EMA divergence (as a fraction of price) treated as a
/// full-strength crossover.
const CROSSOVER_FULL_SCALE: f64 = 0.01;

const WEIGHT_CROSSOVER: f64 = 0.40;
const WEIGHT_RSI: f64 = 0.35;
const WEIGHT_MACD: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Long,
    Short,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub direction: Direction,
    pub strength: f64,
    pub reasons: Vec<String>,
    pub entry_price: f64,
    pub atr: f64,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub params: IndicatorParams,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub rsi_extreme_high: f64,
    pub rsi_extreme_low: f64,
    /// Below this many generated signals the fallback list kicks in.
    pub usability_threshold: usize,
    pub fallback_symbols: Vec<String>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            params: IndicatorParams::default(),
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_extreme_high: 80.0,
            rsi_extreme_low: 20.0,
            usability_threshold: 5,
            fallback_symbols: Vec::new(),
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), crate::domain::error::SiftraderError> {
        let invalid = |key: &str, reason: &str| crate::domain::error::SiftraderError::ConfigInvalid {
            section: "signal".to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if !(0.0..=100.0).contains(&self.rsi_overbought)
            || !(0.0..=100.0).contains(&self.rsi_oversold)
        {
            return Err(invalid("rsi", "RSI thresholds must lie in [0, 100]"));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(invalid("rsi", "rsi_oversold must be below rsi_overbought"));
        }
        if self.rsi_extreme_high < self.rsi_overbought || self.rsi_extreme_low > self.rsi_oversold {
            return Err(invalid(
                "rsi",
                "extreme RSI levels must bracket the overbought/oversold band",
            ));
        }
        if self.params.ema_fast >= self.params.ema_slow {
            return Err(invalid("ema", "ema_fast must be shorter than ema_slow"));
        }
        if self.params.rsi_period == 0 || self.params.macd_signal == 0 {
            return Err(invalid("periods", "indicator periods must be positive"));
        }
        Ok(())
    }
}

/// Evaluate one candidate's snapshot. Returns `None` when no entry
/// conditions line up this cycle.
pub fn generate_signal(
    symbol: &str,
    snapshot: &TechnicalSnapshot,
    cfg: &SignalConfig,
    now: NaiveDateTime,
) -> Option<TradeSignal> {
    // extreme-RSI veto before anything else
    if snapshot.rsi > cfg.rsi_extreme_high || snapshot.rsi < cfg.rsi_extreme_low {
        return None;
    }

    let direction = if snapshot.ema_crossed_above() && snapshot.rsi < cfg.rsi_overbought {
        Direction::Long
    } else if snapshot.ema_crossed_below() && snapshot.rsi > cfg.rsi_oversold {
        Direction::Short
    } else {
        return None;
    };

    if !snapshot.volume_confirms() {
        return None;
    }

    let mut reasons = vec![
        match direction {
            Direction::Long => "EMA bullish crossover".to_string(),
            Direction::Short => "EMA bearish crossover".to_string(),
        },
        "volume confirmation".to_string(),
    ];

    let crossover_term = if snapshot.last_close > 0.0 {
        ((snapshot.ema_fast - snapshot.ema_slow).abs()
            / snapshot.last_close
            / CROSSOVER_FULL_SCALE)
            .min(1.0)
    } else {
        0.0
    };

    let rsi_term = match direction {
        Direction::Long => ((snapshot.rsi - 50.0) / 50.0).clamp(0.0, 1.0),
        Direction::Short => ((50.0 - snapshot.rsi) / 50.0).clamp(0.0, 1.0),
    };

    let macd_agrees = match direction {
        Direction::Long => snapshot.macd_histogram > 0.0,
        Direction::Short => snapshot.macd_histogram < 0.0,
    };
    let macd_term = if macd_agrees {
        reasons.push("MACD histogram confirms".to_string());
        1.0
    } else {
        0.0
    };

    let strength = (WEIGHT_CROSSOVER * crossover_term
        + WEIGHT_RSI * rsi_term
        + WEIGHT_MACD * macd_term)
        .clamp(0.0, 1.0);

    Some(TradeSignal {
        symbol: symbol.to_string(),
        direction,
        strength,
        reasons,
        entry_price: snapshot.last_close,
        atr: snapshot.atr,
        generated_at: now,
    })
}
