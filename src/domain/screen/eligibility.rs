//! Stage 1 gate: static attribute checks.
//!
//! Pure and order-independent, so the funnel may evaluate it concurrently
//! across the whole universe.

use crate::domain::instrument::{Instrument, InstrumentKind};
use crate::domain::screen::{RejectReason, ScreeningConfig};

/// Accepts plain equities with unit lot size, price inside the configured
/// bounds (inclusive), and — when an allow-list is configured — a matching
/// sector tag.
pub fn evaluate(instrument: &Instrument, cfg: &ScreeningConfig) -> Result<(), RejectReason> {
    if instrument.kind != InstrumentKind::Equity {
        return Err(RejectReason::NotAnEquity);
    }
    if instrument.lot_size != 1 {
        return Err(RejectReason::OddLotSize {
            lot_size: instrument.lot_size,
        });
    }
    if instrument.last_price < cfg.min_price || instrument.last_price > cfg.max_price {
        return Err(RejectReason::PriceOutOfBounds {
            price: instrument.last_price,
        });
    }
    if let Some(allowed) = &cfg.sectors {
        let ok = instrument
            .sector
            .as_ref()
            .is_some_and(|s| allowed.iter().any(|a| a.eq_ignore_ascii_case(s)));
        if !ok {
            return Err(RejectReason::SectorNotAllowed {
                sector: instrument.sector.clone(),
            });
        }
    }
    Ok(())
}
