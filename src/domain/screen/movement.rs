//! Stage 3 gate: intraday percentage-move band.
//!
//! The band excludes both near-flat instruments and ones moving too
//! erratically to manage risk on. Bounds are inclusive.

use crate::domain::instrument::Instrument;
use crate::domain::screen::{RejectReason, ScreeningConfig};

pub fn evaluate(instrument: &Instrument, cfg: &ScreeningConfig) -> Result<(), RejectReason> {
    let move_pct = instrument
        .intraday_move_pct()
        .ok_or(RejectReason::MalformedSnapshot)?;
    if move_pct < cfg.min_move_pct || move_pct > cfg.max_move_pct {
        return Err(RejectReason::MoveOutOfBand { move_pct });
    }
    Ok(())
}
