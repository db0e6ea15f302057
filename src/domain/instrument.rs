//! Instrument snapshot types.
//!
//! An [`Instrument`] is an immutable per-cycle snapshot of one tradable
//! security: static attributes (kind, lot size, sector) plus the day's
//! running market data. The universe provider refreshes these each cycle.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstrumentKind {
    Equity,
    Derivative,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instrument {
    pub symbol: String,
    pub exchange: String,
    pub kind: InstrumentKind,
    pub lot_size: u32,
    pub last_price: f64,
    pub avg_volume: f64,
    pub day_volume: f64,
    pub day_high: f64,
    pub day_low: f64,
    pub day_open: f64,
    pub sector: Option<String>,
}

impl Instrument {
    /// |last - open| / open, or `None` when the open is non-positive
    /// (malformed snapshot).
    pub fn intraday_move_pct(&self) -> Option<f64> {
        if self.day_open <= 0.0 {
            return None;
        }
        Some(((self.last_price - self.day_open) / self.day_open).abs())
    }

    /// day_volume / avg_volume, or `None` when the average is non-positive.
    pub fn volume_spike(&self) -> Option<f64> {
        if self.avg_volume <= 0.0 {
            return None;
        }
        Some(self.day_volume / self.avg_volume)
    }

    /// (day_high - day_low) / last_price, or `None` when the last price is
    /// non-positive.
    pub fn day_range_pct(&self) -> Option<f64> {
        if self.last_price <= 0.0 {
            return None;
        }
        Some((self.day_high - self.day_low) / self.last_price)
    }
}
