//! Multi-timeframe aggregation, macro anchoring and timeframe buckets
//! (§4.3.8).

use crate::domain::market::decision::{FinalBias, ScoredSignals};
use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-timeframe input to the aggregator: the scored `{long, short, wait}`
/// triple plus the final per-TF confidence/bias already computed by the
/// decision engine.
#[derive(Debug, Clone, Copy)]
pub struct PerTimeframeDecision {
    pub timeframe: Timeframe,
    pub scores: ScoredSignals,
    pub bias: FinalBias,
    pub confidence: Decimal,
}

fn aggregation_weight(timeframe: Timeframe) -> Decimal {
    match timeframe {
        Timeframe::M30 => dec!(0.25),
        Timeframe::H1 => dec!(0.25),
        Timeframe::H4 => dec!(0.30),
        Timeframe::D1 => dec!(0.20),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroOverride {
    pub triggered: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedDecision {
    pub bias: FinalBias,
    pub confidence: Decimal,
    pub long: Decimal,
    pub short: Decimal,
    pub wait: Decimal,
    pub macro_bias: Option<FinalBias>,
    pub macro_override: Option<MacroOverride>,
    pub reasoning: Vec<String>,
}

/// Weighted-renormalized aggregation across whatever timeframes are
/// present; `bias` follows the same 1.3×/0.8× buffer rule the per-TF
/// decision uses.
pub fn aggregate(decisions: &[PerTimeframeDecision]) -> AggregatedDecision {
    let active_weight: Decimal = decisions.iter().map(|d| aggregation_weight(d.timeframe)).sum();

    let mut long = Decimal::ZERO;
    let mut short = Decimal::ZERO;
    let mut wait = Decimal::ZERO;
    for d in decisions {
        let w = aggregation_weight(d.timeframe);
        long += d.scores.long * w;
        short += d.scores.short * w;
        wait += d.scores.wait * w;
    }
    if active_weight > Decimal::ZERO {
        long /= active_weight;
        short /= active_weight;
        wait /= active_weight;
    }

    let bias = if long > dec!(1.3) * short && long > dec!(0.8) * wait {
        FinalBias::Long
    } else if short > dec!(1.3) * long && short > dec!(0.8) * wait {
        FinalBias::Short
    } else {
        FinalBias::Wait
    };

    let confidence = match bias {
        FinalBias::Wait => (dec!(10) - long.max(short)).clamp(Decimal::ZERO, dec!(10)),
        _ => long.max(short),
    };

    let mut result = AggregatedDecision {
        bias,
        confidence,
        long,
        short,
        wait,
        macro_bias: None,
        macro_override: None,
        reasoning: Vec::new(),
    };

    if let Some(macro_bias) = compute_macro_bias(decisions)
        && macro_bias != result.bias
        && macro_bias != FinalBias::Wait
    {
        let reason = format!(
            "Macro timeframes ({:?}) oppose the aggregated bias; forcing WAIT",
            macro_bias
        );
        result.bias = FinalBias::Wait;
        result.confidence = result.confidence.min(dec!(4));
        result.reasoning.insert(0, reason.clone());
        result.macro_override = Some(MacroOverride {
            triggered: true,
            reason,
        });
    }
    result.macro_bias = compute_macro_bias(decisions);

    result
}

/// `macroBias` from `(4h, 1d)`: agree with both confidence >= 6 wins; else
/// 1d alone >= 7; else 4h alone >= 7 while 1d is neutral; else `None`.
fn compute_macro_bias(decisions: &[PerTimeframeDecision]) -> Option<FinalBias> {
    let by_tf: HashMap<Timeframe, &PerTimeframeDecision> = decisions.iter().map(|d| (d.timeframe, d)).collect();
    let h4 = by_tf.get(&Timeframe::H4).copied();
    let d1 = by_tf.get(&Timeframe::D1).copied();

    if let (Some(h4), Some(d1)) = (h4, d1)
        && h4.bias == d1.bias
        && h4.bias != FinalBias::Wait
        && h4.confidence >= dec!(6)
        && d1.confidence >= dec!(6)
    {
        return Some(h4.bias);
    }
    if let Some(d1) = d1
        && d1.bias != FinalBias::Wait
        && d1.confidence >= dec!(7)
    {
        return Some(d1.bias);
    }
    if let (Some(h4), Some(d1)) = (h4, d1)
        && h4.bias != FinalBias::Wait
        && h4.confidence >= dec!(7)
        && d1.bias == FinalBias::Wait
    {
        return Some(h4.bias);
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketName {
    Macro,
    Micro,
    Scalping,
}

impl BucketName {
    pub fn members(&self) -> [Timeframe; 2] {
        match self {
            BucketName::Macro => [Timeframe::D1, Timeframe::H4],
            BucketName::Micro => [Timeframe::H4, Timeframe::H1],
            BucketName::Scalping => [Timeframe::H1, Timeframe::M30],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketBias {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSummary {
    pub bucket: BucketName,
    pub bias: BucketBias,
    pub confidence: Decimal,
    pub trade_stance_active: bool,
    pub summary: String,
    pub bullets: Vec<String>,
}

/// Averages the per-TF `{long, short, wait}` scores across a bucket's
/// members (only the members actually present in `decisions`).
pub fn summarize_bucket(bucket: BucketName, decisions: &[PerTimeframeDecision]) -> Option<BucketSummary> {
    let members: Vec<&PerTimeframeDecision> = decisions
        .iter()
        .filter(|d| bucket.members().contains(&d.timeframe))
        .collect();
    if members.is_empty() {
        return None;
    }

    let n = Decimal::from(members.len());
    let avg_long: Decimal = members.iter().map(|d| d.scores.long).sum::<Decimal>() / n;
    let avg_short: Decimal = members.iter().map(|d| d.scores.short).sum::<Decimal>() / n;
    let avg_confidence: Decimal = members.iter().map(|d| d.confidence).sum::<Decimal>() / n;

    let bias = if avg_long > dec!(1.2) * avg_short {
        BucketBias::Bullish
    } else if avg_short > dec!(1.2) * avg_long {
        BucketBias::Bearish
    } else {
        BucketBias::Neutral
    };

    let trade_stance_active = avg_confidence >= dec!(6.0);
    let summary = match bias {
        BucketBias::Bullish => format!("{:?} bucket leans bullish", bucket),
        BucketBias::Bearish => format!("{:?} bucket leans bearish", bucket),
        BucketBias::Neutral => format!("{:?} bucket is neutral", bucket),
    };

    Some(BucketSummary {
        bucket,
        bias,
        confidence: avg_confidence,
        trade_stance_active,
        summary,
        bullets: Vec::new(),
    })
}

/// If the macro bucket is confident and non-neutral and scalping doesn't
/// oppose it, the final bias is anchored to the macro bucket.
pub fn apply_macro_hierarchy(
    macro_summary: &BucketSummary,
    scalping_summary: Option<&BucketSummary>,
    mut aggregated: AggregatedDecision,
) -> (AggregatedDecision, bool, Option<String>) {
    if macro_summary.confidence < dec!(6.0) || macro_summary.bias == BucketBias::Neutral {
        return (aggregated, false, None);
    }

    let scalping_opposes = match scalping_summary {
        Some(s) => {
            (macro_summary.bias == BucketBias::Bullish && s.bias == BucketBias::Bearish)
                || (macro_summary.bias == BucketBias::Bearish && s.bias == BucketBias::Bullish)
        }
        None => false,
    };

    if scalping_opposes {
        return (aggregated, false, None);
    }

    aggregated.bias = match macro_summary.bias {
        BucketBias::Bullish => FinalBias::Long,
        BucketBias::Bearish => FinalBias::Short,
        BucketBias::Neutral => aggregated.bias,
    };

    let warning = match scalping_summary {
        Some(s) if s.bias == BucketBias::Neutral => {
            Some("Lower TF consolidating — wait for setup".to_string())
        }
        _ => None,
    };

    (aggregated, true, warning)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decision(tf: Timeframe, long: Decimal, short: Decimal, wait: Decimal, bias: FinalBias, confidence: Decimal) -> PerTimeframeDecision {
        PerTimeframeDecision {
            timeframe: tf,
            scores: ScoredSignals {
                long,
                short,
                wait,
                active_weight: dec!(1),
                direction_confidence: confidence,
                conflict_bonus: Decimal::ZERO,
                no_trade_confidence: Decimal::ZERO,
            },
            bias,
            confidence,
        }
    }

    #[test]
    fn macro_override_forces_wait_when_opposing_aggregated_long() {
        let decisions = vec![
            decision(Timeframe::H4, dec!(2), dec!(8), dec!(0), FinalBias::Short, dec!(7)),
            decision(Timeframe::D1, dec!(2), dec!(8), dec!(0), FinalBias::Short, dec!(7)),
            decision(Timeframe::H1, dec!(10), dec!(0), dec!(0), FinalBias::Long, dec!(8)),
            decision(Timeframe::M30, dec!(10), dec!(0), dec!(0), FinalBias::Long, dec!(8)),
        ];
        let result = aggregate(&decisions);
        assert_eq!(result.bias, FinalBias::Wait);
        assert!(result.confidence <= dec!(4));
        assert!(result.macro_override.as_ref().unwrap().triggered);
    }

    #[test]
    fn bucket_bullish_when_long_clears_1_2x_short() {
        let decisions = vec![
            decision(Timeframe::D1, dec!(8), dec!(2), dec!(1), FinalBias::Long, dec!(8)),
            decision(Timeframe::H4, dec!(7), dec!(2), dec!(1), FinalBias::Long, dec!(7)),
        ];
        let summary = summarize_bucket(BucketName::Macro, &decisions).unwrap();
        assert_eq!(summary.bias, BucketBias::Bullish);
    }

    #[test]
    fn empty_bucket_membership_returns_none() {
        let decisions = vec![decision(Timeframe::M30, dec!(1), dec!(1), dec!(1), FinalBias::Wait, dec!(3))];
        assert!(summarize_bucket(BucketName::Macro, &decisions).is_none());
    }
}
