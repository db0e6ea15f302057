//! Stage 4: potential scoring and deterministic ranking.
//!
//! Each surviving instrument gets four sub-scores, min-max normalized
//! against the filtered population's observed range (population minimum
//! scores 0, maximum scores 1; a degenerate range scores 0.5). The
//! composite is the weighted sum, sorted descending with ties broken by
//! higher average volume, then by symbol ascending.

use crate::domain::instrument::Instrument;
use crate::domain::screen::{ScoreWeights, ScreeningConfig};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SubScores {
    pub volume_surge: f64,
    pub volatility: f64,
    pub momentum: f64,
    pub trading_range: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    pub instrument: Instrument,
    pub scores: SubScores,
    pub composite: f64,
}

/// Raw (un-normalized) metrics backing the four sub-scores.
#[derive(Debug, Clone, Copy)]
struct RawMetrics {
    volume_surge: f64,
    volatility: f64,
    momentum: f64,
    trading_range: f64,
}

fn raw_metrics(instrument: &Instrument) -> Option<RawMetrics> {
    let volume_surge = instrument.volume_spike()?;
    let momentum = instrument.intraday_move_pct()?;
    let trading_range = instrument.day_range_pct()?;
    // true range against the day open, relative to the open
    let hl = instrument.day_high - instrument.day_low;
    let ho = (instrument.day_high - instrument.day_open).abs();
    let lo = (instrument.day_low - instrument.day_open).abs();
    let volatility = hl.max(ho).max(lo) / instrument.day_open;
    Some(RawMetrics {
        volume_surge,
        volatility,
        momentum,
        trading_range,
    })
}

/// Weighted composite of sub-scores. With weights summing to 1.0 and
/// sub-scores in [0,1] the result stays in [0,1]; it is monotone
/// non-decreasing in each sub-score.
pub fn composite_score(scores: &SubScores, weights: &ScoreWeights) -> f64 {
    weights.volume_surge * scores.volume_surge
        + weights.volatility * scores.volatility
        + weights.momentum * scores.momentum
        + weights.trading_range * scores.trading_range
}

/// Position of `value` within [min, max]; 0.5 when the range is degenerate.
fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        (value - min) / (max - min)
    } else {
        0.5
    }
}

/// Score the filtered population, rank it, and truncate to
/// `cfg.max_candidates`. Instruments whose snapshot no longer supports the
/// raw metrics (possible only when called outside the funnel) are dropped.
pub fn score_and_rank(instruments: &[Instrument], cfg: &ScreeningConfig) -> Vec<ScoredCandidate> {
    let raws: Vec<(&Instrument, RawMetrics)> = instruments
        .iter()
        .filter_map(|i| raw_metrics(i).map(|m| (i, m)))
        .collect();

    if raws.is_empty() {
        return Vec::new();
    }

    let range = |f: fn(&RawMetrics) -> f64| {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for (_, m) in &raws {
            let v = f(m);
            min = min.min(v);
            max = max.max(v);
        }
        (min, max)
    };

    let (surge_min, surge_max) = range(|m| m.volume_surge);
    let (vol_min, vol_max) = range(|m| m.volatility);
    let (mom_min, mom_max) = range(|m| m.momentum);
    let (rng_min, rng_max) = range(|m| m.trading_range);

    let mut candidates: Vec<ScoredCandidate> = raws
        .into_iter()
        .map(|(instrument, m)| {
            let scores = SubScores {
                volume_surge: normalize(m.volume_surge, surge_min, surge_max),
                volatility: normalize(m.volatility, vol_min, vol_max),
                momentum: normalize(m.momentum, mom_min, mom_max),
                trading_range: normalize(m.trading_range, rng_min, rng_max),
            };
            ScoredCandidate {
                composite: composite_score(&scores, &cfg.weights),
                instrument: instrument.clone(),
                scores,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.composite
            .total_cmp(&a.composite)
            .then_with(|| b.instrument.avg_volume.total_cmp(&a.instrument.avg_volume))
            .then_with(|| a.instrument.symbol.cmp(&b.instrument.symbol))
    });
    candidates.truncate(cfg.max_candidates);
    candidates
}
