//! Trading engine: wires the funnel, sentiment gate and risk engine into a
//! screening cycle over the configured ports.

use crate::domain::config_validation::EngineSettings;
use crate::domain::error::SiftraderError;
use crate::domain::funnel::{
    generate_signals, screen_universe, CancelToken, SignalSkip,
};
use crate::domain::risk::{PositionEvent, RiskConfig, RiskEngine, RiskReject};
use crate::domain::screen::scoring::ScoredCandidate;
use crate::domain::screen::{Rejection, ScreeningConfig};
use crate::domain::sentiment::{self, MarketSentiment};
use crate::domain::signal::{SignalConfig, TradeSignal};
use crate::domain::position::Position;
use crate::ports::market_port::{HistoryPort, UniversePort};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::HashMap;

/// A signal the risk engine refused, with its reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedSignal {
    pub signal: TradeSignal,
    pub reason: RiskReject,
}

/// Everything one cycle produced, for the caller to render or emit.
#[derive(Debug, Serialize)]
pub struct CycleReport {
    pub universe_size: usize,
    pub sentiment: MarketSentiment,
    pub entries_paused: bool,
    pub candidates: Vec<ScoredCandidate>,
    pub rejections: Vec<Rejection>,
    pub signals: Vec<TradeSignal>,
    pub skips: Vec<SignalSkip>,
    pub fallback_used: bool,
    pub opened: Vec<Position>,
    pub dropped: Vec<DroppedSignal>,
    pub events: Vec<PositionEvent>,
}

pub struct Engine {
    screening: ScreeningConfig,
    signal: SignalConfig,
    settings: EngineSettings,
    risk: RiskEngine,
    pool: rayon::ThreadPool,
    cancel: CancelToken,
}

impl Engine {
    pub fn new(
        screening: ScreeningConfig,
        signal: SignalConfig,
        risk: RiskConfig,
        settings: EngineSettings,
    ) -> Result<Self, SiftraderError> {
        screening.validate()?;
        signal.validate()?;
        let risk = RiskEngine::new(risk)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(settings.worker_threads)
            .build()
            .map_err(|e| SiftraderError::ConfigInvalid {
                section: "engine".to_string(),
                key: "worker_threads".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Engine {
            screening,
            signal,
            settings,
            risk,
            pool,
            cancel: CancelToken::new(),
        })
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn risk(&self) -> &RiskEngine {
        &self.risk
    }

    /// One full cycle: snapshot -> funnel -> signals -> risk admission,
    /// then a monitoring tick over the open positions with the snapshot's
    /// latest prices.
    pub fn run_cycle(
        &self,
        universe: &dyn UniversePort,
        history: &dyn HistoryPort,
        now: NaiveDateTime,
    ) -> Result<CycleReport, SiftraderError> {
        let instruments = universe.snapshot()?;
        info!("cycle start: {} instruments in universe", instruments.len());

        let sentiment = match &self.settings.index_symbol {
            Some(index) => match history.history(index) {
                Ok(bars) => sentiment::analyze(&bars, &self.signal.params),
                Err(e) => {
                    warn!("index history for {index} unavailable ({e}); sentiment neutral");
                    MarketSentiment::neutral()
                }
            },
            None => MarketSentiment::neutral(),
        };
        let entries_paused = sentiment.pauses_entries();
        if entries_paused {
            info!(
                "bearish tape (score {:.2}): pausing new entries this cycle",
                sentiment.score
            );
        }

        let screen = self
            .pool
            .install(|| screen_universe(&instruments, &self.screening, &self.cancel))?;
        info!(
            "screen: {} candidates, {} rejections",
            screen.candidates.len(),
            screen.rejections.len()
        );

        let deep_count = screen.candidates.len().min(self.screening.final_count);
        let deep = &screen.candidates[..deep_count];

        let signal_outcome = self
            .pool
            .install(|| generate_signals(deep, history, &self.signal, now, &self.cancel))?;
        info!(
            "signals: {} generated, {} skipped{}",
            signal_outcome.signals.len(),
            signal_outcome.skips.len(),
            if signal_outcome.fallback_used {
                " (fallback list used)"
            } else {
                ""
            }
        );

        let mut opened = Vec::new();
        let mut dropped = Vec::new();
        if !entries_paused {
            for signal in &signal_outcome.signals {
                match self.risk.evaluate_signal(signal, now) {
                    Ok(position) => {
                        info!(
                            "opened {} {} x{} @ {:.2} (stop {:.2}, target {:.2})",
                            position.direction,
                            position.symbol,
                            position.quantity,
                            position.entry_price,
                            position.stop_loss,
                            position.take_profit
                        );
                        opened.push(position);
                    }
                    Err(reason) => {
                        debug!("dropped {}: {reason}", signal.symbol);
                        dropped.push(DroppedSignal {
                            signal: signal.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        let prices: HashMap<String, f64> = instruments
            .iter()
            .map(|i| (i.symbol.clone(), i.last_price))
            .collect();
        let events = self.monitor_tick(&prices, now)?;

        Ok(CycleReport {
            universe_size: screen.universe_size,
            sentiment,
            entries_paused,
            candidates: screen.candidates,
            rejections: screen.rejections,
            signals: signal_outcome.signals,
            skips: signal_outcome.skips,
            fallback_used: signal_outcome.fallback_used,
            opened,
            dropped,
            events,
        })
    }

    /// Advance every open position once against the given price map.
    /// Missing or non-positive prices count as stale reads.
    pub fn monitor_tick(
        &self,
        prices: &HashMap<String, f64>,
        now: NaiveDateTime,
    ) -> Result<Vec<PositionEvent>, SiftraderError> {
        let mut events = Vec::new();
        for position in self.risk.open_positions() {
            let latest = prices.get(&position.symbol).copied();
            if latest.is_none() {
                debug!("no fresh price for {}; holding", position.symbol);
            }
            let event = self.risk.advance_position(&position.symbol, latest, now)?;
            if event.is_exit() {
                let p = event.position();
                info!(
                    "exit {} ({}) realized {:.2}",
                    p.symbol, p.state, p.realized_pnl
                );
            }
            events.push(event);
        }
        Ok(events)
    }

    /// Emergency square-off of everything open.
    pub fn square_off_all(&self) -> Vec<PositionEvent> {
        let events = self.risk.close_all();
        if !events.is_empty() {
            warn!("emergency square-off: closed {} positions", events.len());
        }
        events
    }
}
