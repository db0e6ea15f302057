//! Stage 2 gate: volume floor and volume-spike ratio.
//!
//! Both thresholds are inclusive lower bounds; equal values pass.

use crate::domain::instrument::Instrument;
use crate::domain::screen::{RejectReason, ScreeningConfig};

pub fn evaluate(instrument: &Instrument, cfg: &ScreeningConfig) -> Result<(), RejectReason> {
    if instrument.avg_volume < cfg.min_avg_volume {
        return Err(RejectReason::VolumeBelowFloor {
            avg_volume: instrument.avg_volume,
        });
    }
    // spike ratio is undefined without a positive average
    let ratio = instrument
        .volume_spike()
        .ok_or(RejectReason::MalformedSnapshot)?;
    if ratio < cfg.min_volume_spike {
        return Err(RejectReason::SpikeBelowMinimum { ratio });
    }
    Ok(())
}
