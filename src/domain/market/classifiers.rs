//! Timeframe-aware classifiers (§4.3.1): price/OI move strength and funding
//! level, each keyed off per-timeframe thresholds.

use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveStrength {
    Noise,
    Normal,
    Strong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveClassification {
    pub direction: MoveDirection,
    pub strength: MoveStrength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingLevel {
    CriticalLow,
    Low,
    Normal,
    High,
    CriticalHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bias {
    Long,
    Short,
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingClassification {
    pub level: FundingLevel,
    pub bias: Bias,
}

/// Default per-timeframe classification thresholds, as percentages.
pub struct Thresholds {
    pub price_noise_pct: Decimal,
    pub price_strong_pct: Decimal,
    pub oi_quiet_pct: Decimal,
    pub oi_aggressive_pct: Decimal,
    pub funding: Decimal,
}

pub fn default_thresholds(timeframe: Timeframe) -> Thresholds {
    match timeframe {
        Timeframe::M30 => Thresholds {
            price_noise_pct: dec!(0.25),
            price_strong_pct: dec!(0.50),
            oi_quiet_pct: dec!(0.15),
            oi_aggressive_pct: dec!(0.30),
            funding: dec!(0.03),
        },
        Timeframe::H1 => Thresholds {
            price_noise_pct: dec!(0.40),
            price_strong_pct: dec!(0.80),
            oi_quiet_pct: dec!(0.25),
            oi_aggressive_pct: dec!(0.50),
            funding: dec!(0.04),
        },
        Timeframe::H4 => Thresholds {
            price_noise_pct: dec!(0.65),
            price_strong_pct: dec!(1.30),
            oi_quiet_pct: dec!(0.50),
            oi_aggressive_pct: dec!(1.00),
            funding: dec!(0.05),
        },
        Timeframe::D1 => Thresholds {
            price_noise_pct: dec!(1.15),
            price_strong_pct: dec!(2.30),
            oi_quiet_pct: dec!(1.00),
            oi_aggressive_pct: dec!(2.00),
            funding: dec!(0.06),
        },
    }
}

pub fn classify_price_move(delta_pct: Decimal, timeframe: Timeframe) -> MoveClassification {
    let t = default_thresholds(timeframe);
    classify_move(delta_pct, t.price_noise_pct, t.price_strong_pct)
}

pub fn classify_oi_move(delta_pct: Decimal, timeframe: Timeframe) -> MoveClassification {
    let t = default_thresholds(timeframe);
    classify_move(delta_pct, t.oi_quiet_pct, t.oi_aggressive_pct)
}

fn classify_move(delta_pct: Decimal, noise: Decimal, strong: Decimal) -> MoveClassification {
    let magnitude = delta_pct.abs();
    let direction = if magnitude < noise {
        MoveDirection::Flat
    } else if delta_pct > Decimal::ZERO {
        MoveDirection::Up
    } else {
        MoveDirection::Down
    };
    let strength = if magnitude < noise {
        MoveStrength::Noise
    } else if magnitude >= strong {
        MoveStrength::Strong
    } else {
        MoveStrength::Normal
    };
    MoveClassification { direction, strength }
}

/// z-score is the primary signal; `rate` only disambiguates the label when
/// `|z| <= 2` (callers still need a current funding rate for display).
pub fn classify_funding_level(_rate: Decimal, z_score: Decimal) -> FundingClassification {
    if z_score > dec!(2) {
        FundingClassification {
            level: FundingLevel::CriticalHigh,
            bias: Bias::Short,
        }
    } else if z_score < dec!(-2) {
        FundingClassification {
            level: FundingLevel::CriticalLow,
            bias: Bias::Long,
        }
    } else if z_score > dec!(1) {
        FundingClassification {
            level: FundingLevel::High,
            bias: Bias::Wait,
        }
    } else if z_score < dec!(-1) {
        FundingClassification {
            level: FundingLevel::Low,
            bias: Bias::Wait,
        }
    } else {
        FundingClassification {
            level: FundingLevel::Normal,
            bias: Bias::Wait,
        }
    }
}
