//! Market-data port traits.

use crate::domain::bar::Bar;
use crate::domain::error::SiftraderError;
use crate::domain::instrument::Instrument;

/// Periodic snapshot of the tradable universe.
pub trait UniversePort {
    fn snapshot(&self) -> Result<Vec<Instrument>, SiftraderError>;
}

/// Ordered intraday bar series per symbol.
///
/// Implementations own their per-instrument fetch timeout; a timeout or
/// fetch failure surfaces as an error and drops only that instrument from
/// the cycle. `Sync` because the funnel fans out across a worker pool.
pub trait HistoryPort: Sync {
    fn history(&self, symbol: &str) -> Result<Vec<Bar>, SiftraderError>;
}
