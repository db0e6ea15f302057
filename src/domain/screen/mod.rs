//! Screening funnel configuration and per-stage rejection reporting.

pub mod eligibility;
pub mod liquidity;
pub mod movement;
pub mod scoring;

use crate::domain::error::SiftraderError;
use serde::Serialize;
use std::fmt;

/// Weights for the four potential-score components. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub volume_surge: f64,
    pub volatility: f64,
    pub momentum: f64,
    pub trading_range: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            volume_surge: 0.30,
            volatility: 0.25,
            momentum: 0.25,
            trading_range: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.volume_surge + self.volatility + self.momentum + self.trading_range
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningConfig {
    pub min_price: f64,
    pub max_price: f64,
    pub min_avg_volume: f64,
    pub min_volume_spike: f64,
    pub min_move_pct: f64,
    pub max_move_pct: f64,
    pub max_candidates: usize,
    pub final_count: usize,
    pub sectors: Option<Vec<String>>,
    pub weights: ScoreWeights,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        ScreeningConfig {
            min_price: 10.0,
            max_price: 10_000.0,
            min_avg_volume: 100_000.0,
            min_volume_spike: 1.5,
            min_move_pct: 0.005,
            max_move_pct: 0.08,
            max_candidates: 150,
            final_count: 50,
            sectors: None,
            weights: ScoreWeights::default(),
        }
    }
}

impl ScreeningConfig {
    /// Semantic validation, run once at cycle start. Weight-sum tolerance is
    /// 1e-9.
    pub fn validate(&self) -> Result<(), SiftraderError> {
        let invalid = |key: &str, reason: String| SiftraderError::ConfigInvalid {
            section: "screening".to_string(),
            key: key.to_string(),
            reason,
        };

        if self.min_price <= 0.0 {
            return Err(invalid("min_price", "min_price must be positive".into()));
        }
        if self.max_price < self.min_price {
            return Err(invalid(
                "max_price",
                "max_price must be >= min_price".into(),
            ));
        }
        if self.min_avg_volume < 0.0 {
            return Err(invalid(
                "min_avg_volume",
                "min_avg_volume must be non-negative".into(),
            ));
        }
        if self.min_volume_spike <= 0.0 {
            return Err(invalid(
                "min_volume_spike",
                "min_volume_spike must be positive".into(),
            ));
        }
        if self.min_move_pct < 0.0 {
            return Err(invalid(
                "min_move_pct",
                "min_move_pct must be non-negative".into(),
            ));
        }
        if self.max_move_pct < self.min_move_pct {
            return Err(invalid(
                "max_move_pct",
                "max_move_pct must be >= min_move_pct".into(),
            ));
        }
        if self.max_candidates == 0 {
            return Err(invalid(
                "max_candidates",
                "max_candidates must be at least 1".into(),
            ));
        }
        if self.final_count == 0 || self.final_count > self.max_candidates {
            return Err(invalid(
                "final_count",
                "final_count must be in 1..=max_candidates".into(),
            ));
        }

        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(invalid(
                "weights",
                format!("score weights must sum to 1.0, got {sum}"),
            ));
        }
        for (name, w) in [
            ("volume_surge", self.weights.volume_surge),
            ("volatility", self.weights.volatility),
            ("momentum", self.weights.momentum),
            ("trading_range", self.weights.trading_range),
        ] {
            if w < 0.0 {
                return Err(invalid(
                    "weights",
                    format!("weight {name} must be non-negative"),
                ));
            }
        }
        Ok(())
    }
}

/// Funnel stage that produced a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Eligibility,
    Liquidity,
    Movement,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Eligibility => write!(f, "eligibility"),
            Stage::Liquidity => write!(f, "liquidity"),
            Stage::Movement => write!(f, "movement"),
        }
    }
}

/// Why a gate rejected an instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RejectReason {
    NotAnEquity,
    OddLotSize { lot_size: u32 },
    PriceOutOfBounds { price: f64 },
    SectorNotAllowed { sector: Option<String> },
    VolumeBelowFloor { avg_volume: f64 },
    SpikeBelowMinimum { ratio: f64 },
    MoveOutOfBand { move_pct: f64 },
    MalformedSnapshot,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotAnEquity => write!(f, "not a plain equity"),
            RejectReason::OddLotSize { lot_size } => write!(f, "lot size {lot_size} != 1"),
            RejectReason::PriceOutOfBounds { price } => {
                write!(f, "price {price} outside configured bounds")
            }
            RejectReason::SectorNotAllowed { sector } => match sector {
                Some(s) => write!(f, "sector {s} not in allow-list"),
                None => write!(f, "no sector tag with allow-list configured"),
            },
            RejectReason::VolumeBelowFloor { avg_volume } => {
                write!(f, "average volume {avg_volume} below floor")
            }
            RejectReason::SpikeBelowMinimum { ratio } => {
                write!(f, "volume spike ratio {ratio} below minimum")
            }
            RejectReason::MoveOutOfBand { move_pct } => {
                write!(f, "intraday move {:.2}% outside band", move_pct * 100.0)
            }
            RejectReason::MalformedSnapshot => write!(f, "malformed snapshot data"),
        }
    }
}

/// A structured rejection report: which instrument, which stage, why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub symbol: String,
    pub stage: Stage,
    pub reason: RejectReason,
}
