//! CSV file market-data adapters.
//!
//! `CsvUniverseAdapter` reads one snapshot file:
//! `symbol,exchange,kind,lot_size,last_price,avg_volume,day_volume,day_high,day_low,day_open,sector`
//!
//! `CsvHistoryAdapter` reads `<SYMBOL>.csv` files from a directory:
//! `timestamp,open,high,low,close,volume` with `YYYY-MM-DD HH:MM:SS`
//! timestamps, sorted on load.

use crate::domain::bar::Bar;
use crate::domain::error::SiftraderError;
use crate::domain::instrument::{Instrument, InstrumentKind};
use crate::ports::market_port::{HistoryPort, UniversePort};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use std::str::FromStr;

fn data_err(path: &Path, reason: impl Into<String>) -> SiftraderError {
    SiftraderError::Data {
        path: path.display().to_string(),
        reason: reason.into(),
    }
}

fn field<'a>(
    record: &'a csv::StringRecord,
    index: usize,
    name: &str,
    path: &Path,
) -> Result<&'a str, SiftraderError> {
    record
        .get(index)
        .ok_or_else(|| data_err(path, format!("missing {name} column")))
}

fn parse<T: FromStr>(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
    path: &Path,
) -> Result<T, SiftraderError> {
    field(record, index, name, path)?
        .trim()
        .parse()
        .map_err(|_| data_err(path, format!("invalid {name} value")))
}

pub struct CsvUniverseAdapter {
    path: PathBuf,
}

impl CsvUniverseAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl UniversePort for CsvUniverseAdapter {
    fn snapshot(&self) -> Result<Vec<Instrument>, SiftraderError> {
        let mut reader = csv::Reader::from_path(&self.path)
            .map_err(|e| data_err(&self.path, e.to_string()))?;
        let mut instruments = Vec::new();

        for result in reader.records() {
            let record = result.map_err(|e| data_err(&self.path, e.to_string()))?;

            let kind = match field(&record, 2, "kind", &self.path)?.trim() {
                s if s.eq_ignore_ascii_case("equity") => InstrumentKind::Equity,
                s if s.eq_ignore_ascii_case("derivative") => InstrumentKind::Derivative,
                other => {
                    return Err(data_err(
                        &self.path,
                        format!("unknown instrument kind: {other}"),
                    ))
                }
            };
            let sector = field(&record, 10, "sector", &self.path)
                .ok()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string);

            instruments.push(Instrument {
                symbol: field(&record, 0, "symbol", &self.path)?.trim().to_string(),
                exchange: field(&record, 1, "exchange", &self.path)?.trim().to_string(),
                kind,
                lot_size: parse(&record, 3, "lot_size", &self.path)?,
                last_price: parse(&record, 4, "last_price", &self.path)?,
                avg_volume: parse(&record, 5, "avg_volume", &self.path)?,
                day_volume: parse(&record, 6, "day_volume", &self.path)?,
                day_high: parse(&record, 7, "day_high", &self.path)?,
                day_low: parse(&record, 8, "day_low", &self.path)?,
                day_open: parse(&record, 9, "day_open", &self.path)?,
                sector,
            });
        }

        Ok(instruments)
    }
}

pub struct CsvHistoryAdapter {
    base_path: PathBuf,
}

impl CsvHistoryAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }
}

impl HistoryPort for CsvHistoryAdapter {
    fn history(&self, symbol: &str) -> Result<Vec<Bar>, SiftraderError> {
        let path = self.csv_path(symbol);
        if !path.exists() {
            return Err(SiftraderError::NoHistory {
                symbol: symbol.to_string(),
            });
        }
        let mut reader =
            csv::Reader::from_path(&path).map_err(|e| data_err(&path, e.to_string()))?;
        let mut bars = Vec::new();

        for result in reader.records() {
            let record = result.map_err(|e| data_err(&path, e.to_string()))?;

            let ts_str = field(&record, 0, "timestamp", &path)?.trim();
            let timestamp = NaiveDateTime::parse_from_str(ts_str, "%Y-%m-%d %H:%M:%S")
                .map_err(|_| data_err(&path, format!("invalid timestamp: {ts_str}")))?;

            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: parse(&record, 1, "open", &path)?,
                high: parse(&record, 2, "high", &path)?,
                low: parse(&record, 3, "low", &path)?,
                close: parse(&record, 4, "close", &path)?,
                volume: parse(&record, 5, "volume", &path)?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}
