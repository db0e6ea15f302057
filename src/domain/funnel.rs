//! The screening funnel: gates, scorer, and signal generation.
//!
//! Stages are stateless and embarrassingly parallel across instruments;
//! each gate fans out on the ambient rayon pool (callers bound the pool via
//! `ThreadPool::install`). A cycle may be cancelled wholesale between
//! stages; no stage mutates shared state.

use crate::domain::error::SiftraderError;
use crate::domain::instrument::Instrument;
use crate::domain::screen::scoring::{score_and_rank, ScoredCandidate};
use crate::domain::screen::{eligibility, liquidity, movement};
use crate::domain::screen::{RejectReason, Rejection, ScreeningConfig, Stage};
use crate::domain::signal::{generate_signal, SignalConfig, TradeSignal};
use crate::domain::snapshot::{SnapshotError, TechnicalSnapshot};
use crate::ports::market_port::HistoryPort;
use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag, checked between funnel stages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn checkpoint(&self) -> Result<(), SiftraderError> {
        if self.is_cancelled() {
            Err(SiftraderError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Stages 1-4 over one universe snapshot.
#[derive(Debug, Clone)]
pub struct ScreenOutcome {
    pub candidates: Vec<ScoredCandidate>,
    pub rejections: Vec<Rejection>,
    pub universe_size: usize,
}

fn run_gate<F>(
    input: Vec<Instrument>,
    stage: Stage,
    rejections: &mut Vec<Rejection>,
    gate: F,
) -> Vec<Instrument>
where
    F: Fn(&Instrument) -> Result<(), RejectReason> + Sync,
{
    let results: Vec<Result<Instrument, Rejection>> = input
        .into_par_iter()
        .map(|instrument| match gate(&instrument) {
            Ok(()) => Ok(instrument),
            Err(reason) => Err(Rejection {
                symbol: instrument.symbol.clone(),
                stage,
                reason,
            }),
        })
        .collect();

    let mut pass = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(instrument) => pass.push(instrument),
            Err(rejection) => rejections.push(rejection),
        }
    }
    pass
}

/// Run stages 1-4: eligibility, liquidity, movement, then scoring/ranking
/// truncated to `cfg.max_candidates`. Configuration is validated up front
/// and is the only cycle-fatal failure besides cancellation.
pub fn screen_universe(
    instruments: &[Instrument],
    cfg: &ScreeningConfig,
    cancel: &CancelToken,
) -> Result<ScreenOutcome, SiftraderError> {
    cfg.validate()?;
    let universe_size = instruments.len();
    let mut rejections = Vec::new();

    cancel.checkpoint()?;
    let survivors = run_gate(
        instruments.to_vec(),
        Stage::Eligibility,
        &mut rejections,
        |i| eligibility::evaluate(i, cfg),
    );

    cancel.checkpoint()?;
    let survivors = run_gate(survivors, Stage::Liquidity, &mut rejections, |i| {
        liquidity::evaluate(i, cfg)
    });

    cancel.checkpoint()?;
    let survivors = run_gate(survivors, Stage::Movement, &mut rejections, |i| {
        movement::evaluate(i, cfg)
    });

    cancel.checkpoint()?;
    let candidates = score_and_rank(&survivors, cfg);

    Ok(ScreenOutcome {
        candidates,
        rejections,
        universe_size,
    })
}

/// Why signal generation skipped an instrument this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipCause {
    DataUnavailable(String),
    InsufficientHistory { bars: usize, minimum: usize },
    MalformedSeries(String),
}

impl fmt::Display for SkipCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipCause::DataUnavailable(reason) => write!(f, "data unavailable: {reason}"),
            SkipCause::InsufficientHistory { bars, minimum } => {
                write!(f, "insufficient history ({bars}/{minimum} bars)")
            }
            SkipCause::MalformedSeries(reason) => write!(f, "malformed series: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalSkip {
    pub symbol: String,
    pub cause: SkipCause,
}

/// Stage 5 over the ranked candidates.
#[derive(Debug, Clone)]
pub struct SignalOutcome {
    /// Ordered for the risk engine: strength descending, ties broken by
    /// higher average volume, then symbol ascending.
    pub signals: Vec<TradeSignal>,
    pub skips: Vec<SignalSkip>,
    pub fallback_used: bool,
}

fn evaluate_symbol(
    symbol: &str,
    history: &dyn HistoryPort,
    cfg: &SignalConfig,
    now: NaiveDateTime,
) -> Result<Option<TradeSignal>, SignalSkip> {
    let bars = history.history(symbol).map_err(|e| SignalSkip {
        symbol: symbol.to_string(),
        cause: SkipCause::DataUnavailable(e.to_string()),
    })?;
    let snapshot = TechnicalSnapshot::compute(&bars, &cfg.params).map_err(|e| SignalSkip {
        symbol: symbol.to_string(),
        cause: match e {
            SnapshotError::InsufficientHistory { bars, minimum } => {
                SkipCause::InsufficientHistory { bars, minimum }
            }
            SnapshotError::MalformedSeries { reason } => SkipCause::MalformedSeries(reason),
        },
    })?;
    Ok(generate_signal(symbol, &snapshot, cfg, now))
}

fn evaluate_set(
    symbols: &[String],
    history: &dyn HistoryPort,
    cfg: &SignalConfig,
    now: NaiveDateTime,
    signals: &mut Vec<TradeSignal>,
    skips: &mut Vec<SignalSkip>,
) {
    let results: Vec<Result<Option<TradeSignal>, SignalSkip>> = symbols
        .par_iter()
        .map(|symbol| evaluate_symbol(symbol, history, cfg, now))
        .collect();
    for result in results {
        match result {
            Ok(Some(signal)) => signals.push(signal),
            Ok(None) => {}
            Err(skip) => skips.push(skip),
        }
    }
}

/// Run stage 5. Per-instrument failures become [`SignalSkip`] entries, never
/// cycle failures. When the surviving signal count falls below the
/// usability threshold, the client-supplied fallback list covers the gap —
/// an explicit second branch, not an error path.
pub fn generate_signals(
    candidates: &[ScoredCandidate],
    history: &dyn HistoryPort,
    cfg: &SignalConfig,
    now: NaiveDateTime,
    cancel: &CancelToken,
) -> Result<SignalOutcome, SiftraderError> {
    cfg.validate()?;
    cancel.checkpoint()?;

    let mut signals = Vec::new();
    let mut skips = Vec::new();

    let primary: Vec<String> = candidates
        .iter()
        .map(|c| c.instrument.symbol.clone())
        .collect();
    evaluate_set(&primary, history, cfg, now, &mut signals, &mut skips);

    let fallback_used = if signals.len() < cfg.usability_threshold
        && !cfg.fallback_symbols.is_empty()
    {
        cancel.checkpoint()?;
        let seen: HashSet<&String> = primary.iter().collect();
        let extras: Vec<String> = cfg
            .fallback_symbols
            .iter()
            .filter(|s| !seen.contains(s))
            .cloned()
            .collect();
        evaluate_set(&extras, history, cfg, now, &mut signals, &mut skips);
        true
    } else {
        false
    };

    // the risk engine consumes strongest-first; ties follow the ranking
    // tie-break (average volume, then symbol)
    let volumes: HashMap<&str, f64> = candidates
        .iter()
        .map(|c| (c.instrument.symbol.as_str(), c.instrument.avg_volume))
        .collect();
    signals.sort_by(|a, b| {
        let vol_a = volumes.get(a.symbol.as_str()).copied().unwrap_or(0.0);
        let vol_b = volumes.get(b.symbol.as_str()).copied().unwrap_or(0.0);
        b.strength
            .total_cmp(&a.strength)
            .then_with(|| vol_b.total_cmp(&vol_a))
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    Ok(SignalOutcome {
        signals,
        skips,
        fallback_used,
    })
}
