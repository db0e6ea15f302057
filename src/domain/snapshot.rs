//! Per-candidate technical snapshot.
//!
//! A [`TechnicalSnapshot`] holds the latest indicator values for one
//! instrument plus the bar window they were computed from. It is recomputed
//! each cycle and never mutated after creation.

use crate::domain::bar::Bar;
use crate::domain::indicator::{
    calculate_bollinger, calculate_ema, calculate_macd, calculate_rsi, IndicatorValue,
};
use crate::domain::indicator_helpers::{average_volume, calc_atr};

/// Indicator windows used to build a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorParams {
    pub rsi_period: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub macd_signal: usize,
    pub bollinger_period: usize,
    pub bollinger_mult_x100: u32,
    pub atr_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            rsi_period: 14,
            ema_fast: 12,
            ema_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_mult_x100: 200,
            atr_period: 14,
        }
    }
}

impl IndicatorParams {
    /// Bars required before every indicator (and the previous-bar EMA pair
    /// used for crossover detection) is out of warmup.
    pub fn min_bars(&self) -> usize {
        (self.ema_slow + self.macd_signal)
            .saturating_sub(1)
            .max(self.rsi_period + 1)
            .max(self.bollinger_period)
            .max(self.atr_period)
            .max(self.ema_slow + 1)
            .max(2)
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum SnapshotError {
    #[error("insufficient history: have {bars} bars, need {minimum}")]
    InsufficientHistory { bars: usize, minimum: usize },

    #[error("malformed series: {reason}")]
    MalformedSeries { reason: String },
}

#[derive(Debug, Clone)]
pub struct TechnicalSnapshot {
    pub rsi: f64,
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub prev_ema_fast: f64,
    pub prev_ema_slow: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_histogram: f64,
    pub boll_upper: f64,
    pub boll_middle: f64,
    pub boll_lower: f64,
    pub atr: f64,
    pub last_close: f64,
    pub last_volume: i64,
    pub avg_volume: f64,
    pub bars: Vec<Bar>,
}

impl TechnicalSnapshot {
    pub fn compute(bars: &[Bar], params: &IndicatorParams) -> Result<Self, SnapshotError> {
        let minimum = params.min_bars();
        if bars.len() < minimum {
            return Err(SnapshotError::InsufficientHistory {
                bars: bars.len(),
                minimum,
            });
        }

        for (i, bar) in bars.iter().enumerate() {
            if !bar.is_well_formed() {
                return Err(SnapshotError::MalformedSeries {
                    reason: format!("bad bar at index {i}"),
                });
            }
            if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
                return Err(SnapshotError::MalformedSeries {
                    reason: format!("timestamps not strictly increasing at index {i}"),
                });
            }
        }

        let last = bars.len() - 1;
        let prev = last - 1;

        let rsi_series = calculate_rsi(bars, params.rsi_period);
        let fast_series = calculate_ema(bars, params.ema_fast);
        let slow_series = calculate_ema(bars, params.ema_slow);
        let macd_series = calculate_macd(
            bars,
            params.ema_fast,
            params.ema_slow,
            params.macd_signal,
        );
        let boll_series =
            calculate_bollinger(bars, params.bollinger_period, params.bollinger_mult_x100);
        let atr_series = calc_atr(bars, params.atr_period);

        // min_bars guarantees every access below is past warmup
        let malformed = || SnapshotError::MalformedSeries {
            reason: "indicator warmup not satisfied".into(),
        };
        let rsi = rsi_series.simple_at(last).ok_or_else(malformed)?;
        let ema_fast = fast_series.simple_at(last).ok_or_else(malformed)?;
        let ema_slow = slow_series.simple_at(last).ok_or_else(malformed)?;
        let prev_ema_fast = fast_series.simple_at(prev).ok_or_else(malformed)?;
        let prev_ema_slow = slow_series.simple_at(prev).ok_or_else(malformed)?;
        let atr = atr_series.simple_at(last).ok_or_else(malformed)?;

        let (macd_line, macd_signal, macd_histogram) = match macd_series.values[last].value {
            IndicatorValue::Macd {
                line,
                signal,
                histogram,
            } if macd_series.values[last].valid => (line, signal, histogram),
            _ => return Err(malformed()),
        };
        let (boll_upper, boll_middle, boll_lower) = match boll_series.values[last].value {
            IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            } if boll_series.values[last].valid => (upper, middle, lower),
            _ => return Err(malformed()),
        };

        Ok(TechnicalSnapshot {
            rsi,
            ema_fast,
            ema_slow,
            prev_ema_fast,
            prev_ema_slow,
            macd_line,
            macd_signal,
            macd_histogram,
            boll_upper,
            boll_middle,
            boll_lower,
            atr,
            last_close: bars[last].close,
            last_volume: bars[last].volume,
            avg_volume: average_volume(bars),
            bars: bars.to_vec(),
        })
    }

    /// Fast EMA crossed above slow EMA on the latest bar.
    pub fn ema_crossed_above(&self) -> bool {
        self.prev_ema_fast <= self.prev_ema_slow && self.ema_fast > self.ema_slow
    }

    /// Fast EMA crossed below slow EMA on the latest bar.
    pub fn ema_crossed_below(&self) -> bool {
        self.prev_ema_fast >= self.prev_ema_slow && self.ema_fast < self.ema_slow
    }

    /// Latest bar volume at or above the series average.
    pub fn volume_confirms(&self) -> bool {
        self.last_volume as f64 >= self.avg_volume
    }
}
