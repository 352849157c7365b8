//! Regime detection (§4.3.6): a priority-ordered state machine over the
//! classified price/OI/funding/CVD signals, shaped after the teacher's
//! `MarketRegimeDetector::detect` (first-match-wins branches, confidence
//! from met-condition ratio plus a small fixed bonus).

use crate::domain::market::classifiers::{Bias, MoveClassification, MoveDirection, MoveStrength};
use crate::domain::market::divergence::{CvdSign, ExchangeScenario};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    DistributionWhaleExit,
    AccumulationWhaleEntry,
    TrapLongTrap,
    TrapShortTrap,
    TrendingHealthyBull,
    TrendingHealthyBear,
    CoveringLongSqueeze,
    CoveringShortSqueeze,
    RangeChop,
    UnclearMixedSignals,
}

impl Regime {
    /// Coarse family used by the trade-stance/risk-mode rules, which gate on
    /// `regime ∈ {range, trap, covering}` rather than the specific subtype.
    pub fn family(&self) -> &'static str {
        match self {
            Regime::DistributionWhaleExit => "distribution",
            Regime::AccumulationWhaleEntry => "accumulation",
            Regime::TrapLongTrap | Regime::TrapShortTrap => "trap",
            Regime::TrendingHealthyBull | Regime::TrendingHealthyBear => "trending",
            Regime::CoveringLongSqueeze | Regime::CoveringShortSqueeze => "covering",
            Regime::RangeChop => "range",
            Regime::UnclearMixedSignals => "unclear",
        }
    }

    pub fn bias_hint(&self) -> Bias {
        match self {
            Regime::DistributionWhaleExit | Regime::TrapLongTrap | Regime::CoveringLongSqueeze => Bias::Short,
            Regime::AccumulationWhaleEntry | Regime::TrapShortTrap | Regime::CoveringShortSqueeze => Bias::Long,
            Regime::TrendingHealthyBull => Bias::Long,
            Regime::TrendingHealthyBear => Bias::Short,
            Regime::RangeChop | Regime::UnclearMixedSignals => Bias::Wait,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeResult {
    pub regime: Regime,
    pub confidence: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct RegimeInputs {
    pub price_move: MoveClassification,
    pub binance_oi_move: MoveClassification,
    pub bybit_oi_move: MoveClassification,
    pub funding_bias: Bias,
    pub cvd_sign: CvdSign,
    pub scenario: ExchangeScenario,
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
fn rising(m: MoveClassification) -> bool {
    m.strength != MoveStrength::Noise && m.direction == MoveDirection::Up
}
fn falling(m: MoveClassification) -> bool {
    m.strength != MoveStrength::Noise && m.direction == MoveDirection::Down
}
fn quiet(m: MoveClassification) -> bool {
    m.strength == MoveStrength::Noise
}

/// `round(metCount / totalConditions * 10)` capped at 10, plus the
/// regime-specific base bonus (kept at or under the 5-point cap named for
/// every branch below; see DESIGN.md for the per-branch constant).
fn scored_confidence(met: usize, total: usize, bonus: Decimal) -> Decimal {
    let total = total.max(1);
    let base = (Decimal::from(met) / Decimal::from(total) * dec!(10)).round();
    (base + bonus).min(dec!(10))
}

pub fn detect_regime(input: &RegimeInputs) -> RegimeResult {
    // distribution.whale_exit
    let conditions = [
        !down(input.price_move),
        rising(input.binance_oi_move) || rising(input.bybit_oi_move),
        input.funding_bias == Bias::Short,
        input.cvd_sign == CvdSign::Negative,
    ];
    let met = conditions.iter().filter(|&&c| c).count();
    if conditions.iter().all(|&c| c) || input.scenario == ExchangeScenario::WhaleDistribution {
        return RegimeResult {
            regime: Regime::DistributionWhaleExit,
            confidence: scored_confidence(met, conditions.len(), dec!(2)),
        };
    }

    // accumulation.whale_entry
    let conditions = [
        flat(input.price_move),
        rising(input.binance_oi_move) || rising(input.bybit_oi_move),
        input.funding_bias == Bias::Long,
        input.cvd_sign == CvdSign::Positive,
    ];
    let met = conditions.iter().filter(|&&c| c).count();
    if conditions.iter().all(|&c| c) || input.scenario == ExchangeScenario::WhaleAccumulation {
        return RegimeResult {
            regime: Regime::AccumulationWhaleEntry,
            confidence: scored_confidence(met, conditions.len(), dec!(2)),
        };
    }

    // trap.long_trap
    let conditions = [
        up(input.price_move),
        rising(input.binance_oi_move) || rising(input.bybit_oi_move),
        input.funding_bias == Bias::Short,
        input.cvd_sign == CvdSign::Negative,
    ];
    let met = conditions.iter().filter(|&&c| c).count();
    if conditions.iter().all(|&c| c) {
        return RegimeResult {
            regime: Regime::TrapLongTrap,
            confidence: scored_confidence(met, conditions.len(), dec!(3)),
        };
    }

    // trap.short_trap
    let conditions = [
        down(input.price_move),
        rising(input.binance_oi_move) || rising(input.bybit_oi_move),
        input.funding_bias == Bias::Long,
        input.cvd_sign == CvdSign::Positive,
    ];
    let met = conditions.iter().filter(|&&c| c).count();
    if conditions.iter().all(|&c| c) {
        return RegimeResult {
            regime: Regime::TrapShortTrap,
            confidence: scored_confidence(met, conditions.len(), dec!(3)),
        };
    }

    // trending.healthy_bull / healthy_bear: price & OI rising together with
    // matching CVD, funding not extreme, synchronized scenario.
    let synchronized = matches!(
        input.scenario,
        ExchangeScenario::SynchronizedBullish | ExchangeScenario::SynchronizedBearish
    );
    let funding_not_extreme = input.funding_bias == Bias::Wait;
    if up(input.price_move)
        && rising(input.binance_oi_move)
        && rising(input.bybit_oi_move)
        && input.cvd_sign == CvdSign::Positive
        && funding_not_extreme
        && synchronized
    {
        return RegimeResult {
            regime: Regime::TrendingHealthyBull,
            confidence: scored_confidence(6, 6, dec!(1)),
        };
    }
    if down(input.price_move)
        && rising(input.binance_oi_move)
        && rising(input.bybit_oi_move)
        && input.cvd_sign == CvdSign::Negative
        && funding_not_extreme
        && synchronized
    {
        return RegimeResult {
            regime: Regime::TrendingHealthyBear,
            confidence: scored_confidence(6, 6, dec!(1)),
        };
    }

    // Overrides, checked last.
    if down(input.price_move) && (falling(input.binance_oi_move) || falling(input.bybit_oi_move)) {
        return RegimeResult {
            regime: Regime::CoveringLongSqueeze,
            confidence: scored_confidence(2, 2, dec!(1)),
        };
    }
    if up(input.price_move) && (falling(input.binance_oi_move) || falling(input.bybit_oi_move)) {
        return RegimeResult {
            regime: Regime::CoveringShortSqueeze,
            confidence: scored_confidence(2, 2, dec!(1)),
        };
    }
    if flat(input.price_move) && quiet(input.binance_oi_move) && quiet(input.bybit_oi_move) {
        return RegimeResult {
            regime: Regime::RangeChop,
            confidence: dec!(3),
        };
    }

    RegimeResult {
        regime: Regime::UnclearMixedSignals,
        confidence: dec!(4),
    }
}
