//! Configuration loading and fail-fast validation.
//!
//! Builds the typed config structs from a [`ConfigPort`] once per cycle.
//! Anything malformed fails here, before screening starts.

use crate::domain::error::SiftraderError;
use crate::domain::risk::RiskConfig;
use crate::domain::screen::{ScoreWeights, ScreeningConfig};
use crate::domain::signal::SignalConfig;
use crate::domain::snapshot::IndicatorParams;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveTime;

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> SiftraderError {
    SiftraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn get_count(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, SiftraderError> {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value).map_err(|_| invalid(section, key, format!("{key} must be non-negative")))
}

fn parse_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: NaiveTime,
) -> Result<NaiveTime, SiftraderError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map_err(|_| invalid(section, key, format!("invalid {key}, expected HH:MM"))),
    }
}

pub fn load_screening_config(config: &dyn ConfigPort) -> Result<ScreeningConfig, SiftraderError> {
    let defaults = ScreeningConfig::default();
    let weight_defaults = ScoreWeights::default();

    let sectors = {
        let list = config.get_list("screening", "sectors");
        if list.is_empty() { None } else { Some(list) }
    };

    let cfg = ScreeningConfig {
        min_price: config.get_double("screening", "min_price", defaults.min_price),
        max_price: config.get_double("screening", "max_price", defaults.max_price),
        min_avg_volume: config.get_double("screening", "min_avg_volume", defaults.min_avg_volume),
        min_volume_spike: config.get_double(
            "screening",
            "min_volume_spike",
            defaults.min_volume_spike,
        ),
        min_move_pct: config.get_double("screening", "min_move_pct", defaults.min_move_pct),
        max_move_pct: config.get_double("screening", "max_move_pct", defaults.max_move_pct),
        max_candidates: get_count(config, "screening", "max_candidates", defaults.max_candidates)?,
        final_count: get_count(config, "screening", "final_count", defaults.final_count)?,
        sectors,
        weights: ScoreWeights {
            volume_surge: config.get_double("weights", "volume_surge", weight_defaults.volume_surge),
            volatility: config.get_double("weights", "volatility", weight_defaults.volatility),
            momentum: config.get_double("weights", "momentum", weight_defaults.momentum),
            trading_range: config.get_double(
                "weights",
                "trading_range",
                weight_defaults.trading_range,
            ),
        },
    };
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_signal_config(config: &dyn ConfigPort) -> Result<SignalConfig, SiftraderError> {
    let defaults = SignalConfig::default();
    let param_defaults = IndicatorParams::default();

    let bollinger_mult = config.get_double("signal", "bollinger_stddev", 2.0);
    if bollinger_mult <= 0.0 {
        return Err(invalid(
            "signal",
            "bollinger_stddev",
            "bollinger_stddev must be positive",
        ));
    }

    let cfg = SignalConfig {
        params: IndicatorParams {
            rsi_period: get_count(config, "signal", "rsi_period", param_defaults.rsi_period)?,
            ema_fast: get_count(config, "signal", "ema_fast", param_defaults.ema_fast)?,
            ema_slow: get_count(config, "signal", "ema_slow", param_defaults.ema_slow)?,
            macd_signal: get_count(config, "signal", "macd_signal", param_defaults.macd_signal)?,
            bollinger_period: get_count(
                config,
                "signal",
                "bollinger_period",
                param_defaults.bollinger_period,
            )?,
            bollinger_mult_x100: (bollinger_mult * 100.0).round() as u32,
            atr_period: get_count(config, "signal", "atr_period", param_defaults.atr_period)?,
        },
        rsi_overbought: config.get_double("signal", "rsi_overbought", defaults.rsi_overbought),
        rsi_oversold: config.get_double("signal", "rsi_oversold", defaults.rsi_oversold),
        rsi_extreme_high: config.get_double(
            "signal",
            "rsi_extreme_high",
            defaults.rsi_extreme_high,
        ),
        rsi_extreme_low: config.get_double("signal", "rsi_extreme_low", defaults.rsi_extreme_low),
        usability_threshold: get_count(
            config,
            "signal",
            "usability_threshold",
            defaults.usability_threshold,
        )?,
        fallback_symbols: config.get_list("signal", "fallback_symbols"),
    };
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_risk_config(config: &dyn ConfigPort) -> Result<RiskConfig, SiftraderError> {
    let defaults = RiskConfig::default();

    let daily_budget = config.get_double("risk", "daily_budget", 0.0);
    if daily_budget <= 0.0 {
        return Err(SiftraderError::ConfigMissing {
            section: "risk".to_string(),
            key: "daily_budget".to_string(),
        });
    }

    let max_positions = config.get_int("risk", "max_positions", defaults.max_positions as i64);
    let max_positions = u32::try_from(max_positions)
        .map_err(|_| invalid("risk", "max_positions", "max_positions must be non-negative"))?;

    let cfg = RiskConfig {
        daily_budget,
        risk_per_trade: config.get_double("risk", "risk_per_trade", defaults.risk_per_trade),
        max_positions,
        atr_stop_mult: config.get_double("risk", "atr_stop_mult", defaults.atr_stop_mult),
        max_stop_distance_pct: config.get_double(
            "risk",
            "max_stop_distance_pct",
            defaults.max_stop_distance_pct,
        ),
        min_reward_risk: config.get_double("risk", "min_reward_risk", defaults.min_reward_risk),
        min_signal_strength: config.get_double(
            "risk",
            "min_signal_strength",
            defaults.min_signal_strength,
        ),
        // default circuit breaker: 5% of the daily budget
        max_daily_loss: config.get_double("risk", "max_daily_loss", daily_budget * 0.05),
        session_open: parse_time(config, "session", "open", defaults.session_open)?,
        session_close: parse_time(config, "session", "close", defaults.session_close)?,
        square_off: parse_time(config, "session", "square_off", defaults.square_off)?,
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Engine-level settings that sit outside the domain configs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// 0 means "size to available parallelism".
    pub worker_threads: usize,
    pub index_symbol: Option<String>,
}

pub fn load_engine_settings(config: &dyn ConfigPort) -> Result<EngineSettings, SiftraderError> {
    Ok(EngineSettings {
        worker_threads: get_count(config, "engine", "worker_threads", 0)?,
        index_symbol: config
            .get_string("engine", "index_symbol")
            .filter(|s| !s.trim().is_empty()),
    })
}
