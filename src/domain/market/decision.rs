//! Weighted multi-signal decision scoring (§4.3.7): seven signals, each
//! with a fixed weight, combined with conflict arithmetic and the 1.3×/0.8×
//! bias-buffer rule.

use crate::domain::market::classifiers::Bias;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const WEIGHT_EXCHANGE_DIVERGENCE: Decimal = dec!(0.35);
pub const WEIGHT_MARKET_REGIME: Decimal = dec!(0.20);
pub const WEIGHT_STRUCTURE: Decimal = dec!(0.15);
pub const WEIGHT_VOLUME_PROFILE: Decimal = dec!(0.10);
pub const WEIGHT_TECHNICAL: Decimal = dec!(0.10);
pub const WEIGHT_FUNDING: Decimal = dec!(0.05);
pub const WEIGHT_CVD: Decimal = dec!(0.05);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalName {
    ExchangeDivergence,
    MarketRegime,
    Structure,
    VolumeProfile,
    Technical,
    Funding,
    Cvd,
}

/// One weighted vote in the decision. `weight = 0` removes the signal from
/// `activeWeight` entirely (used by the CVD gating rule).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightedSignal {
    pub name: SignalName,
    pub weight: Decimal,
    pub confidence: Decimal,
    pub bias: Bias,
    pub warning: Option<&'static str>,
}

impl WeightedSignal {
    pub fn new(name: SignalName, weight: Decimal, confidence: Decimal, bias: Bias) -> Self {
        Self {
            name,
            weight,
            confidence,
            bias,
            warning: None,
        }
    }

    pub fn gated(name: SignalName, warning: &'static str) -> Self {
        Self {
            name,
            weight: Decimal::ZERO,
            confidence: Decimal::ZERO,
            bias: Bias::Wait,
            warning: Some(warning),
        }
    }
}

/// CVD is excluded from the vote (weight forced to zero, bias forced to
/// WAIT) under any of the three gates named in §4.3.6: a coarser resolution
/// was substituted for a scalping timeframe, the combined reliability flag
/// is false, or the requested timeframe doesn't match the one being scored.
pub fn cvd_signal(
    cvd: Decimal,
    cvd_normalized: Decimal,
    resolution_matches: bool,
    requested_matches: bool,
    reliable_for_tf: bool,
) -> WeightedSignal {
    if !resolution_matches {
        return WeightedSignal::gated(SignalName::Cvd, "CVD excluded: resolution mismatch");
    }
    if !requested_matches {
        return WeightedSignal::gated(SignalName::Cvd, "CVD excluded: requested timeframe mismatch");
    }
    if !reliable_for_tf {
        return WeightedSignal::gated(SignalName::Cvd, "CVD excluded: unreliable for timeframe");
    }
    let bias = if cvd > Decimal::ZERO {
        Bias::Long
    } else if cvd < Decimal::ZERO {
        Bias::Short
    } else {
        Bias::Wait
    };
    let confidence = (cvd_normalized.abs() * dec!(10)).min(dec!(10));
    WeightedSignal::new(SignalName::Cvd, WEIGHT_CVD, confidence, bias)
}

/// `exchange_divergence` signal: bias/confidence come straight from the
/// scenario evaluator.
pub fn exchange_divergence_signal(bias: Bias, confidence: Decimal) -> WeightedSignal {
    WeightedSignal::new(SignalName::ExchangeDivergence, WEIGHT_EXCHANGE_DIVERGENCE, confidence, bias)
}

/// `market_regime` signal: regime maps to a bias hint via `Regime::bias_hint`.
pub fn market_regime_signal(bias: Bias, confidence: Decimal) -> WeightedSignal {
    WeightedSignal::new(SignalName::MarketRegime, WEIGHT_MARKET_REGIME, confidence, bias)
}

/// `structure` signal: BoS direction takes priority; absent a break, price
/// sitting at support/resistance gives a weaker read.
pub fn structure_signal(bias: Bias, confidence: Decimal) -> WeightedSignal {
    WeightedSignal::new(SignalName::Structure, WEIGHT_STRUCTURE, confidence, bias)
}

/// `volume_profile` signal: below VAL -> LONG, above VAH -> SHORT, else WAIT.
pub fn volume_profile_signal(price: Decimal, val: Decimal, vah: Decimal) -> WeightedSignal {
    let (bias, confidence) = if price < val {
        (Bias::Long, dec!(6))
    } else if price > vah {
        (Bias::Short, dec!(6))
    } else {
        (Bias::Wait, dec!(3))
    };
    WeightedSignal::new(SignalName::VolumeProfile, WEIGHT_VOLUME_PROFILE, confidence, bias)
}

/// `technical` signal: EMA cross combined with the OLS trend direction.
pub fn technical_signal(ema_fast: Decimal, ema_slow: Decimal, trend_up: bool, trend_down: bool) -> WeightedSignal {
    let (bias, confidence) = if ema_fast > ema_slow && trend_up {
        (Bias::Long, dec!(7))
    } else if ema_fast < ema_slow && trend_down {
        (Bias::Short, dec!(7))
    } else {
        (Bias::Wait, dec!(3))
    };
    WeightedSignal::new(SignalName::Technical, WEIGHT_TECHNICAL, confidence, bias)
}

/// `funding` signal: straight from `classify_funding_level`.
pub fn funding_signal(bias: Bias, z_score: Decimal) -> WeightedSignal {
    let confidence = (z_score.abs() * dec!(3)).min(dec!(10));
    WeightedSignal::new(SignalName::Funding, WEIGHT_FUNDING, confidence, bias)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FinalBias {
    Long,
    Short,
    Wait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceType {
    Directional,
    NoTrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStance {
    AvoidTrading,
    LookForLongs,
    LookForShorts,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskMode {
    Defensive,
    Aggressive,
    Normal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoredSignals {
    pub long: Decimal,
    pub short: Decimal,
    pub wait: Decimal,
    pub active_weight: Decimal,
    pub direction_confidence: Decimal,
    pub conflict_bonus: Decimal,
    pub no_trade_confidence: Decimal,
}

/// Normalizes contributions to a 0-10 scale per bucket and derives the
/// conflict arithmetic. Buckets stay at zero (rather than NaN) when no
/// signal carries nonzero weight.
pub fn score_signals(signals: &[WeightedSignal]) -> ScoredSignals {
    let active_weight: Decimal = signals.iter().filter(|s| s.weight > Decimal::ZERO).map(|s| s.weight).sum();

    let mut long = Decimal::ZERO;
    let mut short = Decimal::ZERO;
    let mut wait = Decimal::ZERO;

    for signal in signals {
        if signal.weight.is_zero() {
            continue;
        }
        let contribution = (signal.confidence / dec!(10)) * signal.weight;
        match signal.bias {
            Bias::Long => long += contribution,
            Bias::Short => short += contribution,
            Bias::Wait => wait += contribution,
        }
    }

    if active_weight > Decimal::ZERO {
        long = long / active_weight * dec!(10);
        short = short / active_weight * dec!(10);
        wait = wait / active_weight * dec!(10);
    }

    let direction_confidence = long.max(short);
    let conflict_bonus = if long.max(short) > Decimal::ZERO {
        (long.min(short) / long.max(short) * dec!(3)).clamp(Decimal::ZERO, dec!(3))
    } else {
        Decimal::ZERO
    };
    let no_trade_confidence = (dec!(10) - direction_confidence + conflict_bonus).clamp(Decimal::ZERO, dec!(10));

    ScoredSignals {
        long,
        short,
        wait,
        active_weight,
        direction_confidence,
        conflict_bonus,
        no_trade_confidence,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub bias: FinalBias,
    pub confidence: Decimal,
    pub confidence_type: ConfidenceType,
    pub scores: ScoredSignals,
    pub trade_stance: TradeStance,
    pub risk_mode: RiskMode,
}

/// `LONG` iff `long > 1.3 * short && long > 0.8 * wait`; `SHORT` symmetric;
/// else `WAIT`.
fn select_bias(scores: &ScoredSignals) -> FinalBias {
    if scores.long > dec!(1.3) * scores.short && scores.long > dec!(0.8) * scores.wait {
        FinalBias::Long
    } else if scores.short > dec!(1.3) * scores.long && scores.short > dec!(0.8) * scores.wait {
        FinalBias::Short
    } else {
        FinalBias::Wait
    }
}

/// `regime_is_avoid_family` is true when the regime's family is one of
/// `{range, trap, covering}` (`Regime::family()`), per the tradeStance rule.
pub fn make_decision(
    signals: &[WeightedSignal],
    regime_is_avoid_family: bool,
    regime_is_defensive_family: bool,
    synchronized_healthy_trending: bool,
) -> Decision {
    let scores = score_signals(signals);
    let bias = select_bias(&scores);

    let (confidence, confidence_type) = match bias {
        FinalBias::Wait => (scores.no_trade_confidence, ConfidenceType::NoTrade),
        _ => (scores.direction_confidence, ConfidenceType::Directional),
    };

    let trade_stance = if confidence < dec!(5) || regime_is_avoid_family {
        TradeStance::AvoidTrading
    } else {
        match bias {
            FinalBias::Long => TradeStance::LookForLongs,
            FinalBias::Short => TradeStance::LookForShorts,
            FinalBias::Wait => TradeStance::Neutral,
        }
    };

    let risk_mode = if regime_is_defensive_family || confidence < dec!(6) {
        RiskMode::Defensive
    } else if confidence >= dec!(8) && synchronized_healthy_trending {
        RiskMode::Aggressive
    } else {
        RiskMode::Normal
    };

    Decision {
        bias,
        confidence,
        confidence_type,
        scores,
        trade_stance,
        risk_mode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(name: SignalName, weight: Decimal, confidence: Decimal, bias: Bias) -> WeightedSignal {
        WeightedSignal::new(name, weight, confidence, bias)
    }

    #[test]
    fn perfect_agreement_has_zero_conflict_bonus() {
        let signals = vec![signal(SignalName::ExchangeDivergence, dec!(1), dec!(10), Bias::Long)];
        let scores = score_signals(&signals);
        assert_eq!(scores.conflict_bonus, Decimal::ZERO);
    }

    #[test]
    fn perfectly_split_signals_give_conflict_bonus_of_three() {
        let signals = vec![
            signal(SignalName::ExchangeDivergence, dec!(0.5), dec!(10), Bias::Long),
            signal(SignalName::MarketRegime, dec!(0.5), dec!(10), Bias::Short),
        ];
        let scores = score_signals(&signals);
        assert_eq!(scores.conflict_bonus, dec!(3));
    }

    #[test]
    fn bias_buffer_requires_long_to_clear_1_3x_short_and_0_8x_wait() {
        let mut scores = ScoredSignals {
            long: dec!(6.6),
            short: dec!(5),
            wait: dec!(1),
            active_weight: dec!(1),
            direction_confidence: dec!(6.6),
            conflict_bonus: Decimal::ZERO,
            no_trade_confidence: Decimal::ZERO,
        };
        assert_eq!(select_bias(&scores), FinalBias::Long);
        scores.long = dec!(6.5);
        assert_eq!(select_bias(&scores), FinalBias::Wait);
    }

    #[test]
    fn cvd_signal_gated_on_resolution_mismatch() {
        let signal = cvd_signal(dec!(1000), dec!(0.2), false, true, true);
        assert_eq!(signal.weight, Decimal::ZERO);
        assert_eq!(signal.bias, Bias::Wait);
        assert_eq!(signal.warning, Some("CVD excluded: resolution mismatch"));
    }

    #[test]
    fn low_confidence_forces_avoid_trading() {
        let signals = vec![signal(SignalName::ExchangeDivergence, dec!(1), dec!(2), Bias::Long)];
        let decision = make_decision(&signals, false, false, false);
        assert_eq!(decision.trade_stance, TradeStance::AvoidTrading);
    }
}
