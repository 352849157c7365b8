//! Exchange-divergence scenario classification and the whale/retail OI
//! ratio (§4.3.5).

use crate::domain::market::classifiers::{Bias, MoveClassification, MoveDirection, MoveStrength};
use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CvdSign {
    Positive,
    Negative,
    Neutral,
}

impl CvdSign {
    pub fn from_value(cvd: Decimal) -> Self {
        if cvd > Decimal::ZERO {
            CvdSign::Positive
        } else if cvd < Decimal::ZERO {
            CvdSign::Negative
        } else {
            CvdSign::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct VenueDivergenceInputs {
    pub oi_move: MoveClassification,
    pub oi_delta_pct: Decimal,
    pub oi_usd: Decimal,
    pub cvd_sign: CvdSign,
    pub cvd_reliable: bool,
    pub funding_bias: Bias,
}

#[derive(Debug, Clone, Copy)]
pub struct ExchangeDivergenceInputs {
    pub timeframe: Timeframe,
    pub price_move: MoveClassification,
    pub binance: VenueDivergenceInputs,
    pub bybit: VenueDivergenceInputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeScenario {
    WhaleDistribution,
    WhaleAccumulation,
    RetailFomoRally,
    ShortSqueezeSetup,
    WhaleHedging,
    SynchronizedBullish,
    SynchronizedBearish,
    BybitLeading,
    BinanceNoise,
    Unclear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioBias {
    StrongLong,
    Long,
    StrongShort,
    Short,
    Wait,
}

impl ScenarioBias {
    pub fn as_bias(&self) -> Bias {
        match self {
            ScenarioBias::StrongLong | ScenarioBias::Long => Bias::Long,
            ScenarioBias::StrongShort | ScenarioBias::Short => Bias::Short,
            ScenarioBias::Wait => Bias::Wait,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeDivergenceResult {
    pub scenario: ExchangeScenario,
    pub confidence: Decimal,
    pub bias: ScenarioBias,
    pub warnings: Vec<String>,
}

fn up(m: MoveClassification) -> bool {
    m.direction == MoveDirection::Up
}
fn down(m: MoveClassification) -> bool {
    m.direction == MoveDirection::Down
}
fn flat(m: MoveClassification) -> bool {
    m.direction == MoveDirection::Flat
}
fn strong(m: MoveClassification) -> bool {
    m.strength == MoveStrength::Strong
}
fn quiet(m: MoveClassification) -> bool {
    m.strength == MoveStrength::Noise
}

/// Confidence bands for the scenarios that fire on a strict all-conditions
/// match; calibrated so `whale_distribution`/`whale_accumulation` clear the
/// `>= 8` line the decision engine treats as "strong" (§8 scenario 1).
fn strong_bias_or_plain(bias: Bias, confidence: Decimal) -> ScenarioBias {
    let strong_threshold = dec!(8);
    match bias {
        Bias::Long if confidence >= strong_threshold => ScenarioBias::StrongLong,
        Bias::Long => ScenarioBias::Long,
        Bias::Short if confidence >= strong_threshold => ScenarioBias::StrongShort,
        Bias::Short => ScenarioBias::Short,
        Bias::Wait => ScenarioBias::Wait,
    }
}

pub fn evaluate_scenario(input: &ExchangeDivergenceInputs) -> ExchangeDivergenceResult {
    let mut warnings = Vec::new();

    if up(input.price_move)
        && strong(input.price_move)
        && down(input.bybit.oi_move)
        && strong(input.bybit.oi_move)
        && up(input.binance.oi_move)
        && input.bybit.cvd_reliable
        && input.binance.cvd_sign == CvdSign::Negative
    {
        return ExchangeDivergenceResult {
            scenario: ExchangeScenario::WhaleDistribution,
            confidence: dec!(8.5),
            bias: strong_bias_or_plain(Bias::Short, dec!(8.5)),
            warnings,
        };
    }

    if up(input.bybit.oi_move)
        && input.bybit.cvd_sign == CvdSign::Positive
        && (input.binance.oi_delta_pct - input.bybit.oi_delta_pct) < dec!(-0.5)
    {
        return ExchangeDivergenceResult {
            scenario: ExchangeScenario::WhaleAccumulation,
            confidence: dec!(8.5),
            bias: strong_bias_or_plain(Bias::Long, dec!(8.5)),
            warnings,
        };
    }

    if up(input.price_move)
        && up(input.binance.oi_move)
        && !up(input.bybit.oi_move)
        && input.binance.cvd_sign == CvdSign::Negative
        && input.binance.funding_bias == Bias::Short
    {
        return ExchangeDivergenceResult {
            scenario: ExchangeScenario::RetailFomoRally,
            confidence: dec!(6),
            bias: ScenarioBias::Short,
            warnings,
        };
    }

    if up(input.binance.oi_move)
        && down(input.price_move)
        && input.binance.funding_bias == Bias::Long
        && up(input.bybit.oi_move)
        && input.bybit.cvd_sign == CvdSign::Positive
    {
        return ExchangeDivergenceResult {
            scenario: ExchangeScenario::ShortSqueezeSetup,
            confidence: dec!(6),
            bias: ScenarioBias::Long,
            warnings,
        };
    }

    let ratio = whale_retail_ratio(
        input.bybit.oi_delta_pct,
        input.binance.oi_delta_pct,
        input.bybit.oi_usd,
        input.timeframe,
    );
    if !ratio.reliable {
        warnings.push("whaleRetailRatio below reliability threshold".to_string());
    }

    if up(input.price_move)
        && up(input.bybit.oi_move)
        && input.bybit.cvd_sign == CvdSign::Negative
        && ratio.ratio > dec!(1.5)
    {
        return ExchangeDivergenceResult {
            scenario: ExchangeScenario::WhaleHedging,
            confidence: dec!(6),
            bias: ScenarioBias::Short,
            warnings,
        };
    }

    let both_bullish_cvd =
        input.binance.cvd_sign == CvdSign::Positive && input.bybit.cvd_sign == CvdSign::Positive;
    let both_bearish_cvd =
        input.binance.cvd_sign == CvdSign::Negative && input.bybit.cvd_sign == CvdSign::Negative;

    if up(input.price_move) && up(input.binance.oi_move) && up(input.bybit.oi_move) && both_bullish_cvd {
        return ExchangeDivergenceResult {
            scenario: ExchangeScenario::SynchronizedBullish,
            confidence: dec!(7),
            bias: ScenarioBias::Long,
            warnings,
        };
    }
    if down(input.price_move) && up(input.binance.oi_move) && up(input.bybit.oi_move) && both_bearish_cvd {
        return ExchangeDivergenceResult {
            scenario: ExchangeScenario::SynchronizedBearish,
            confidence: dec!(7),
            bias: ScenarioBias::Short,
            warnings,
        };
    }

    if ratio.ratio > dec!(2) {
        let bias = match input.bybit.cvd_sign {
            CvdSign::Positive => ScenarioBias::Long,
            CvdSign::Negative => ScenarioBias::Short,
            CvdSign::Neutral => ScenarioBias::Wait,
        };
        return ExchangeDivergenceResult {
            scenario: ExchangeScenario::BybitLeading,
            confidence: dec!(6),
            bias,
            warnings,
        };
    }

    if strong(input.binance.oi_move) && quiet(input.bybit.oi_move) {
        return ExchangeDivergenceResult {
            scenario: ExchangeScenario::BinanceNoise,
            confidence: dec!(4),
            bias: ScenarioBias::Wait,
            warnings,
        };
    }

    ExchangeDivergenceResult {
        scenario: ExchangeScenario::Unclear,
        confidence: dec!(4),
        bias: ScenarioBias::Wait,
        warnings,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WhaleRetailRatio {
    pub ratio: Decimal,
    pub reliable: bool,
}

/// `(bybitOiDelta%, binanceOiDelta%, bybitOiUsd, T)`: thresholds scale with
/// the bucket T belongs to (scalping vs macro per §4.3.5).
pub fn whale_retail_ratio(
    bybit_oi_delta_pct: Decimal,
    binance_oi_delta_pct: Decimal,
    bybit_oi_usd: Decimal,
    timeframe: Timeframe,
) -> WhaleRetailRatio {
    let (min_pct, min_usd) = if timeframe.is_scalping() {
        (dec!(0.2), dec!(2_000_000))
    } else {
        (dec!(0.5), dec!(10_000_000))
    };

    let bybit_abs = bybit_oi_delta_pct.abs();
    let binance_abs = binance_oi_delta_pct.abs();
    let usd_delta = (bybit_oi_usd * bybit_abs / dec!(100)).abs();

    if bybit_abs < min_pct || usd_delta < min_usd {
        return WhaleRetailRatio {
            ratio: dec!(1),
            reliable: false,
        };
    }

    if binance_abs < min_pct {
        let ratio = (bybit_abs / min_pct).min(dec!(5));
        return WhaleRetailRatio { ratio, reliable: true };
    }

    let ratio = (bybit_abs / binance_abs).min(dec!(10));
    WhaleRetailRatio { ratio, reliable: true }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeDominance {
    Whale,
    Retail,
    Balanced,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VolumeComparison {
    pub binance_pct: Decimal,
    pub dominant: VolumeDominance,
}

/// Direction-only comparison: raw venue volumes are in incompatible units
/// (coin-margined vs USDT-margined), so only the ratio matters.
pub fn compare_volume(binance_volume: Decimal, bybit_volume: Decimal) -> VolumeComparison {
    let total = binance_volume + bybit_volume;
    let binance_pct = if total.is_zero() {
        dec!(0.5)
    } else {
        binance_volume / total
    };
    let dominant = if bybit_volume > dec!(1.5) * binance_volume {
        VolumeDominance::Whale
    } else if binance_volume > dec!(1.5) * bybit_volume {
        VolumeDominance::Retail
    } else {
        VolumeDominance::Balanced
    };
    VolumeComparison { binance_pct, dominant }
}
