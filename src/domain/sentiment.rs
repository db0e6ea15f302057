//! Market sentiment from a reference index series.
//!
//! A coarse tape read used to pause new entries in a strongly bearish
//! market. Starts neutral at 0.5 and nudges on RSI, EMA trend, MACD and
//! short-horizon momentum of the index.

use crate::domain::bar::Bar;
use crate::domain::snapshot::{IndicatorParams, TechnicalSnapshot};
use serde::Serialize;

const MOMENTUM_LOOKBACK: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketSentiment {
    pub sentiment: Sentiment,
    pub score: f64,
}

impl MarketSentiment {
    pub fn neutral() -> Self {
        MarketSentiment {
            sentiment: Sentiment::Neutral,
            score: 0.5,
        }
    }

    /// Entries pause only when the tape is emphatically bearish.
    pub fn pauses_entries(&self) -> bool {
        self.sentiment == Sentiment::Bearish && self.score < 0.3
    }
}

/// Analyze the index series. Any snapshot failure (short or malformed
/// series) degrades to neutral rather than blocking the cycle.
pub fn analyze(index_bars: &[Bar], params: &IndicatorParams) -> MarketSentiment {
    let Ok(snap) = TechnicalSnapshot::compute(index_bars, params) else {
        return MarketSentiment::neutral();
    };

    let mut score: f64 = 0.5;

    if snap.rsi > 60.0 {
        score += 0.1;
    } else if snap.rsi < 40.0 {
        score -= 0.1;
    }

    if snap.ema_fast > snap.ema_slow {
        score += 0.2;
    } else {
        score -= 0.2;
    }

    if snap.macd_line > snap.macd_signal {
        score += 0.1;
    } else {
        score -= 0.1;
    }

    if snap.bars.len() > MOMENTUM_LOOKBACK {
        let back = snap.bars[snap.bars.len() - 1 - MOMENTUM_LOOKBACK].close;
        if back > 0.0 {
            let change = (snap.last_close - back) / back;
            if change > 0.01 {
                score += 0.1;
            } else if change < -0.01 {
                score -= 0.1;
            }
        }
    }

    let score = score.clamp(0.0, 1.0);
    let sentiment = if score > 0.6 {
        Sentiment::Bullish
    } else if score < 0.4 {
        Sentiment::Bearish
    } else {
        Sentiment::Neutral
    };

    MarketSentiment { sentiment, score }
}
