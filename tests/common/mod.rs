#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use siftrader::domain::bar::Bar;
use siftrader::domain::error::SiftraderError;
use siftrader::domain::instrument::{Instrument, InstrumentKind};
use siftrader::domain::snapshot::{IndicatorParams, TechnicalSnapshot};
use siftrader::ports::market_port::{HistoryPort, UniversePort};
use std::collections::HashMap;

pub fn session_ts(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 14)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn make_instrument(symbol: &str, price: f64, avg_volume: f64, day_open: f64) -> Instrument {
    Instrument {
        symbol: symbol.to_string(),
        exchange: "NSE".to_string(),
        kind: InstrumentKind::Equity,
        lot_size: 1,
        last_price: price,
        avg_volume,
        day_volume: avg_volume * 2.0,
        day_high: price.max(day_open) * 1.002,
        day_low: price.min(day_open) * 0.998,
        day_open,
        sector: None,
    }
}

pub fn make_bars(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            symbol: symbol.to_string(),
            timestamp: session_ts(9, 15) + chrono::Duration::minutes(5 * i as i64),
            open: close,
            high: close * 1.005,
            low: close * 0.995,
            close,
            volume: 1000,
        })
        .collect()
}

/// Zig-zag decline then a rally, truncated at the exact bar where the fast
/// EMA crosses above the slow EMA with mid-range RSI. The final bar carries
/// heavy volume so the generated signal confirms.
pub fn bullish_series(symbol: &str) -> Vec<Bar> {
    let params = IndicatorParams::default();
    let mut closes: Vec<f64> = Vec::new();
    let mut px = 200.0;
    for i in 0..45 {
        px += if i % 2 == 0 { -1.5 } else { 1.0 };
        closes.push(px);
    }
    for _ in 0..40 {
        px += 2.0;
        closes.push(px);
        let mut bars = make_bars(symbol, &closes);
        if let Some(last) = bars.last_mut() {
            last.volume = 50_000;
        }
        if let Ok(snap) = TechnicalSnapshot::compute(&bars, &params) {
            if snap.ema_crossed_above() && snap.rsi < 70.0 && snap.rsi > 20.0 {
                return bars;
            }
        }
    }
    panic!("rally never produced a usable crossover");
}

/// Mirror image of [`bullish_series`]: zig-zag climb then a slide,
/// truncated where the fast EMA crosses below the slow EMA.
pub fn bearish_series(symbol: &str) -> Vec<Bar> {
    let params = IndicatorParams::default();
    let mut closes: Vec<f64> = Vec::new();
    let mut px = 200.0;
    for i in 0..45 {
        px += if i % 2 == 0 { 1.5 } else { -1.0 };
        closes.push(px);
    }
    for _ in 0..40 {
        px -= 2.0;
        closes.push(px);
        let mut bars = make_bars(symbol, &closes);
        if let Some(last) = bars.last_mut() {
            last.volume = 50_000;
        }
        if let Ok(snap) = TechnicalSnapshot::compute(&bars, &params) {
            if snap.ema_crossed_below() && snap.rsi > 30.0 && snap.rsi < 80.0 {
                return bars;
            }
        }
    }
    panic!("slide never produced a usable crossunder");
}

pub struct MockUniversePort {
    pub instruments: Vec<Instrument>,
}

impl UniversePort for MockUniversePort {
    fn snapshot(&self) -> Result<Vec<Instrument>, SiftraderError> {
        Ok(self.instruments.clone())
    }
}

pub struct MockHistoryPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockHistoryPort {
    pub fn new() -> Self {
        MockHistoryPort {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl HistoryPort for MockHistoryPort {
    fn history(&self, symbol: &str) -> Result<Vec<Bar>, SiftraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SiftraderError::Data {
                path: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        self.data
            .get(symbol)
            .cloned()
            .ok_or_else(|| SiftraderError::NoHistory {
                symbol: symbol.to_string(),
            })
    }
}
