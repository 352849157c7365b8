//! Macro-anchoring law (§4.3.8 / §8): a confident, non-neutral macro bucket
//! (D1+H4) pulls the aggregated bias to its own reading unless the scalping
//! bucket (H1+M30) actively opposes it. `apply_macro_hierarchy` had no
//! direct test coverage anywhere before this; `aggregate`'s own
//! macro-override branch (a different mechanism: forcing WAIT when the pure
//! H4/D1 agreement reading opposes the blended aggregate) is covered
//! separately in `aggregation.rs`'s own unit tests.

use btc_sentinel::domain::market::aggregation::{BucketBias, BucketName, aggregate, apply_macro_hierarchy, summarize_bucket};
use btc_sentinel::domain::market::decision::{FinalBias, ScoredSignals};
use btc_sentinel::domain::market::aggregation::PerTimeframeDecision;
use btc_sentinel::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

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
fn a_confident_bullish_macro_bucket_anchors_the_aggregate_when_scalping_agrees() {
    let decisions = vec![
        decision(Timeframe::D1, dec!(9), dec!(1), dec!(0), FinalBias::Long, dec!(8)),
        decision(Timeframe::H4, dec!(8), dec!(1), dec!(1), FinalBias::Long, dec!(7)),
        decision(Timeframe::H1, dec!(6), dec!(1), dec!(3), FinalBias::Long, dec!(6)),
        decision(Timeframe::M30, dec!(5), dec!(2), dec!(3), FinalBias::Long, dec!(5)),
    ];

    let macro_summary = summarize_bucket(BucketName::Macro, &decisions).unwrap();
    let scalping_summary = summarize_bucket(BucketName::Scalping, &decisions).unwrap();
    assert_eq!(macro_summary.bias, BucketBias::Bullish);
    assert!(macro_summary.confidence >= dec!(6.0));
    assert_eq!(scalping_summary.bias, BucketBias::Bullish);

    let aggregated = aggregate(&decisions);
    let (anchored, did_anchor, warning) = apply_macro_hierarchy(&macro_summary, Some(&scalping_summary), aggregated);

    assert!(did_anchor);
    assert_eq!(anchored.bias, FinalBias::Long);
    assert!(warning.is_none());
}

#[test]
fn an_opposing_scalping_bucket_blocks_the_anchor() {
    let decisions = vec![
        decision(Timeframe::D1, dec!(1), dec!(9), dec!(0), FinalBias::Short, dec!(8)),
        decision(Timeframe::H4, dec!(1), dec!(8), dec!(1), FinalBias::Short, dec!(7)),
        decision(Timeframe::H1, dec!(8), dec!(1), dec!(1), FinalBias::Long, dec!(7)),
        decision(Timeframe::M30, dec!(7), dec!(1), dec!(2), FinalBias::Long, dec!(6)),
    ];

    let macro_summary = summarize_bucket(BucketName::Macro, &decisions).unwrap();
    let scalping_summary = summarize_bucket(BucketName::Scalping, &decisions).unwrap();
    assert_eq!(macro_summary.bias, BucketBias::Bearish);
    assert_eq!(scalping_summary.bias, BucketBias::Bullish);

    let aggregated = aggregate(&decisions);
    let original_bias = aggregated.bias;
    let (result, did_anchor, warning) = apply_macro_hierarchy(&macro_summary, Some(&scalping_summary), aggregated);

    assert!(!did_anchor);
    assert_eq!(result.bias, original_bias, "an opposing scalping bucket must leave the aggregate untouched");
    assert!(warning.is_none());
}

#[test]
fn a_macro_bucket_below_the_confidence_gate_never_anchors() {
    let decisions = vec![
        decision(Timeframe::D1, dec!(6), dec!(3), dec!(1), FinalBias::Long, dec!(5)),
        decision(Timeframe::H4, dec!(6), dec!(3), dec!(1), FinalBias::Long, dec!(5)),
    ];

    let macro_summary = summarize_bucket(BucketName::Macro, &decisions).unwrap();
    assert!(macro_summary.confidence < dec!(6.0));

    let aggregated = aggregate(&decisions);
    let original_bias = aggregated.bias;
    let (result, did_anchor, warning) = apply_macro_hierarchy(&macro_summary, None, aggregated);

    assert!(!did_anchor);
    assert_eq!(result.bias, original_bias);
    assert!(warning.is_none());
}

#[test]
fn anchoring_against_a_neutral_scalping_bucket_warns_about_consolidation() {
    let decisions = vec![
        decision(Timeframe::D1, dec!(9), dec!(1), dec!(0), FinalBias::Long, dec!(8)),
        decision(Timeframe::H4, dec!(8), dec!(1), dec!(1), FinalBias::Long, dec!(7)),
        decision(Timeframe::H1, dec!(3), dec!(3), dec!(4), FinalBias::Wait, dec!(3)),
        decision(Timeframe::M30, dec!(3), dec!(3), dec!(4), FinalBias::Wait, dec!(3)),
    ];

    let macro_summary = summarize_bucket(BucketName::Macro, &decisions).unwrap();
    let scalping_summary = summarize_bucket(BucketName::Scalping, &decisions).unwrap();
    assert_eq!(scalping_summary.bias, BucketBias::Neutral);

    let aggregated = aggregate(&decisions);
    let (anchored, did_anchor, warning) = apply_macro_hierarchy(&macro_summary, Some(&scalping_summary), aggregated);

    assert!(did_anchor);
    assert_eq!(anchored.bias, FinalBias::Long);
    assert_eq!(warning.as_deref(), Some("Lower TF consolidating — wait for setup"));
}
