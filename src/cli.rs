//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvHistoryAdapter, CsvUniverseAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::system_clock::SystemClock;
use crate::domain::config_validation::{
    load_engine_settings, load_risk_config, load_screening_config, load_signal_config,
};
use crate::domain::error::SiftraderError;
use crate::domain::funnel::{generate_signals, screen_universe, CancelToken};
use crate::engine::Engine;
use crate::ports::clock_port::Clock;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_port::UniversePort;

#[derive(Parser, Debug)]
#[command(
    name = "siftrader",
    about = "Intraday stock screener and risk-managed trade engine"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the screening funnel over a universe snapshot
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Screen the universe and generate trade signals
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Full cycle: screen, signal, risk admission and one monitoring tick
    Cycle {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Screen { config, json } => run_screen(&config, json),
        Command::Signals { config, json } => run_signals(&config, json),
        Command::Cycle { config, json } => run_cycle(&config, json),
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(&err)
        }
    }
}

fn load_config(path: &Path) -> Result<FileConfigAdapter, SiftraderError> {
    FileConfigAdapter::from_file(path)
}

/// The `[data]` section names the universe snapshot file and the bar
/// history directory; both are required for the data-driven commands.
pub fn data_paths(config: &dyn ConfigPort) -> Result<(PathBuf, PathBuf), SiftraderError> {
    let missing = |key: &str| SiftraderError::ConfigMissing {
        section: "data".to_string(),
        key: key.to_string(),
    };
    let universe = config
        .get_string("data", "universe_file")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| missing("universe_file"))?;
    let history = config
        .get_string("data", "history_dir")
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| missing("history_dir"))?;
    Ok((PathBuf::from(universe), PathBuf::from(history)))
}

pub fn run_screen(config_path: &Path, json: bool) -> Result<(), SiftraderError> {
    let config = load_config(config_path)?;
    let screening = load_screening_config(&config)?;
    let (universe_file, _) = data_paths(&config)?;

    let universe = CsvUniverseAdapter::new(universe_file);
    let instruments = universe.snapshot()?;
    let outcome = screen_universe(&instruments, &screening, &CancelToken::new())?;

    if json {
        println!("{}", to_json(&outcome.candidates)?);
        return Ok(());
    }

    println!(
        "screened {} instruments: {} candidates, {} rejected",
        outcome.universe_size,
        outcome.candidates.len(),
        outcome.rejections.len()
    );
    for (rank, candidate) in outcome.candidates.iter().enumerate() {
        println!(
            "{:>3}. {:<12} score {:.3}  (surge {:.2}, vol {:.2}, mom {:.2}, range {:.2})",
            rank + 1,
            candidate.instrument.symbol,
            candidate.composite,
            candidate.scores.volume_surge,
            candidate.scores.volatility,
            candidate.scores.momentum,
            candidate.scores.trading_range
        );
    }
    for rejection in &outcome.rejections {
        log::debug!(
            "rejected {} at {}: {}",
            rejection.symbol,
            rejection.stage,
            rejection.reason
        );
    }
    Ok(())
}

pub fn run_signals(config_path: &Path, json: bool) -> Result<(), SiftraderError> {
    let config = load_config(config_path)?;
    let screening = load_screening_config(&config)?;
    let signal_cfg = load_signal_config(&config)?;
    let (universe_file, history_dir) = data_paths(&config)?;

    let universe = CsvUniverseAdapter::new(universe_file);
    let history = CsvHistoryAdapter::new(history_dir);
    let instruments = universe.snapshot()?;

    let cancel = CancelToken::new();
    let outcome = screen_universe(&instruments, &screening, &cancel)?;
    let deep_count = outcome.candidates.len().min(screening.final_count);
    let signals = generate_signals(
        &outcome.candidates[..deep_count],
        &history,
        &signal_cfg,
        SystemClock.now(),
        &cancel,
    )?;

    if json {
        println!("{}", to_json(&signals.signals)?);
        return Ok(());
    }

    println!(
        "{} signals from {} candidates ({} skipped{})",
        signals.signals.len(),
        deep_count,
        signals.skips.len(),
        if signals.fallback_used {
            ", fallback list used"
        } else {
            ""
        }
    );
    for signal in &signals.signals {
        println!(
            "{:<12} {:<5} strength {:.2}  entry {:.2}  [{}]",
            signal.symbol,
            signal.direction.to_string(),
            signal.strength,
            signal.entry_price,
            signal.reasons.join(", ")
        );
    }
    for skip in &signals.skips {
        log::warn!("skipped {}: {}", skip.symbol, skip.cause);
    }
    Ok(())
}

pub fn run_cycle(config_path: &Path, json: bool) -> Result<(), SiftraderError> {
    let config = load_config(config_path)?;
    let screening = load_screening_config(&config)?;
    let signal_cfg = load_signal_config(&config)?;
    let risk_cfg = load_risk_config(&config)?;
    let settings = load_engine_settings(&config)?;
    let (universe_file, history_dir) = data_paths(&config)?;

    let engine = Engine::new(screening, signal_cfg, risk_cfg, settings)?;

    let cancel = engine.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        log::warn!("could not install Ctrl-C handler: {e}");
    }

    let universe = CsvUniverseAdapter::new(universe_file);
    let history = CsvHistoryAdapter::new(history_dir);
    let report = engine.run_cycle(&universe, &history, SystemClock.now())?;

    if json {
        println!("{}", to_json(&report)?);
        return Ok(());
    }

    println!(
        "universe {} -> candidates {} -> signals {} -> opened {}",
        report.universe_size,
        report.candidates.len(),
        report.signals.len(),
        report.opened.len()
    );
    if report.entries_paused {
        println!(
            "entries paused: bearish sentiment (score {:.2})",
            report.sentiment.score
        );
    }
    for position in &report.opened {
        println!(
            "opened {:<12} {:<5} x{} @ {:.2} (stop {:.2}, target {:.2})",
            position.symbol,
            position.direction.to_string(),
            position.quantity,
            position.entry_price,
            position.stop_loss,
            position.take_profit
        );
    }
    for dropped in &report.dropped {
        println!("dropped {:<12} {}", dropped.signal.symbol, dropped.reason);
    }
    for event in report.events.iter().filter(|e| e.is_exit()) {
        let p = event.position();
        println!(
            "exit {:<12} {} realized {:.2}",
            p.symbol, p.state, p.realized_pnl
        );
    }

    let summary = engine.risk().summary();
    println!(
        "budget: committed {:.2}, available {:.2}, realized P&L {:.2}, open {}",
        summary.committed, summary.available, summary.realized_pnl, summary.open_count
    );
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), SiftraderError> {
    let config = load_config(config_path)?;
    load_screening_config(&config)?;
    load_signal_config(&config)?;
    load_risk_config(&config)?;
    load_engine_settings(&config)?;
    println!("configuration OK: {}", config_path.display());
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, SiftraderError> {
    serde_json::to_string_pretty(value).map_err(|e| SiftraderError::Data {
        path: "<json output>".to_string(),
        reason: e.to_string(),
    })
}
