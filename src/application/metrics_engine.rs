//! Metrics Engine (§4.3): pure functions turning a multi-venue snapshot plus
//! lookback history into a `MarketState`. Per §7, a missing timeframe is
//! omitted rather than failing the whole cycle, and a timeframe missing both
//! venues is dropped entirely; the aggregator renormalizes over whatever
//! remains.

use crate::domain::market::aggregation::{
    BucketName, BucketSummary, PerTimeframeDecision, aggregate, apply_macro_hierarchy, summarize_bucket,
};
use crate::domain::market::candle::Candle;
use crate::domain::market::classifiers::{
    Bias, MoveClassification, MoveDirection, MoveStrength, classify_funding_level, classify_oi_move,
    classify_price_move,
};
use crate::domain::market::decision::{
    ConfidenceType, FinalBias, ScoredSignals, WeightedSignal, cvd_signal, exchange_divergence_signal,
    funding_signal, make_decision, market_regime_signal, structure_signal, technical_signal, volume_profile_signal,
};
use crate::domain::market::divergence::{CvdSign, ExchangeDivergenceInputs, VenueDivergenceInputs, evaluate_scenario, whale_retail_ratio};
use crate::domain::market::regime::{RegimeInputs, detect_regime};
use crate::domain::market::snapshot::PerTimeframeSnapshot;
use crate::domain::market::state::{DataQuality, FinalDecision, FundingAdvanced, MarketState, OiAdvanced, TimeframeMetrics};
use crate::domain::market::structure::{BreakOfStructure, MarketStructure, detect_structure};
use crate::domain::market::technical::{TrendDirection, summarize as summarize_technical, z_score};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::market::volume_profile::build_volume_profile;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const EMA_FAST_PERIOD: usize = 12;
const EMA_SLOW_PERIOD: usize = 26;

/// One venue's closed-candle history for a `(symbol, timeframe)`, enough to
/// drive technical/structure/volume-profile math plus a funding z-score.
#[derive(Debug, Clone)]
pub struct VenueTimeframeInput {
    pub snapshot: PerTimeframeSnapshot,
    pub candles: Vec<Candle>,
    pub funding_rate_history: Vec<Decimal>,
}

/// Everything the Metrics Engine needs for one timeframe, across both
/// venues. Either venue may be absent (single-venue outage); both absent
/// drops the timeframe entirely — see `build_timeframe_metrics`.
#[derive(Debug, Clone, Default)]
pub struct TimeframeInput {
    pub binance: Option<VenueTimeframeInput>,
    pub bybit: Option<VenueTimeframeInput>,
}

fn closes(candles: &[Candle]) -> Vec<Decimal> {
    candles.iter().map(|c| c.close).collect()
}

/// `|fundingRate%| / 100 * OI`, scaled to USD-per-8h (GLOSSARY: Pain Index).
fn pain_index(funding_rate_avg_pct: Option<Decimal>, oi: Option<Decimal>) -> Decimal {
    match (funding_rate_avg_pct, oi) {
        (Some(rate), Some(oi)) => (rate.abs() / dec!(100)) * oi,
        _ => Decimal::ZERO,
    }
}

fn venue_funding_z(v: &VenueTimeframeInput) -> Decimal {
    z_score(&v.funding_rate_history)
}

fn default_venue_divergence_inputs() -> VenueDivergenceInputs {
    VenueDivergenceInputs {
        oi_move: MoveClassification {
            direction: MoveDirection::Flat,
            strength: MoveStrength::Noise,
        },
        oi_delta_pct: Decimal::ZERO,
        oi_usd: Decimal::ZERO,
        cvd_sign: CvdSign::Neutral,
        cvd_reliable: false,
        funding_bias: Bias::Wait,
    }
}

fn venue_divergence_inputs(v: &VenueTimeframeInput, timeframe: Timeframe) -> VenueDivergenceInputs {
    let oi_delta_pct = v.snapshot.oi_change_pct.unwrap_or(Decimal::ZERO);
    let funding_rate = v.snapshot.funding_rate_avg_pct.unwrap_or(Decimal::ZERO);
    let funding_bias = classify_funding_level(funding_rate, venue_funding_z(v)).bias;
    VenueDivergenceInputs {
        oi_move: classify_oi_move(oi_delta_pct, timeframe),
        oi_delta_pct,
        oi_usd: v.snapshot.oi.unwrap_or(Decimal::ZERO),
        cvd_sign: CvdSign::from_value(v.snapshot.cvd),
        cvd_reliable: v.snapshot.cvd_reliable_for_tf,
        funding_bias,
    }
}

/// `regime.family_variant` key in the `family.variant` shape the glossary
/// uses (e.g. `"range.chop"`), matching what the alert/UI layer expects.
fn regime_key(regime: crate::domain::market::regime::Regime) -> String {
    use crate::domain::market::regime::Regime::*;
    match regime {
        DistributionWhaleExit => "distribution.whale_exit",
        AccumulationWhaleEntry => "accumulation.whale_entry",
        TrapLongTrap => "trap.long_trap",
        TrapShortTrap => "trap.short_trap",
        TrendingHealthyBull => "trending.healthy_bull",
        TrendingHealthyBear => "trending.healthy_bear",
        CoveringLongSqueeze => "covering.long_squeeze",
        CoveringShortSqueeze => "covering.short_squeeze",
        RangeChop => "range.chop",
        UnclearMixedSignals => "unclear.mixed_signals",
    }
    .to_string()
}

/// Weaker structure read when there's no break: price sitting within 0.5% of
/// support/resistance still leans the read, just with lower confidence.
fn structure_signal_inputs(structure: &MarketStructure, price: Decimal) -> (Bias, Decimal) {
    match structure.bos {
        BreakOfStructure::Bullish => (Bias::Long, dec!(7)),
        BreakOfStructure::Bearish => (Bias::Short, dec!(7)),
        BreakOfStructure::None => {
            if let Some(support) = structure.support
                && price <= support * dec!(1.005)
            {
                (Bias::Long, dec!(4))
            } else if let Some(resistance) = structure.resistance
                && price >= resistance * dec!(0.995)
            {
                (Bias::Short, dec!(4))
            } else {
                (Bias::Wait, dec!(2))
            }
        }
    }
}

/// Builds the one `TimeframeMetrics` for `timeframe` from whichever venues
/// are present. Returns `None` if both venues are missing.
pub fn build_timeframe_metrics(timeframe: Timeframe, input: &TimeframeInput) -> Option<TimeframeMetrics> {
    let primary = input.binance.as_ref().or(input.bybit.as_ref())?;
    let price = primary.snapshot.price;

    let technical = summarize_technical(&closes(&primary.candles), EMA_FAST_PERIOD, EMA_SLOW_PERIOD)?;
    let structure = detect_structure(&primary.candles);
    let volume_profile = build_volume_profile(&primary.candles);

    let price_move = classify_price_move(primary.snapshot.price_change_pct, timeframe);

    let binance_divergence = input
        .binance
        .as_ref()
        .map(|v| venue_divergence_inputs(v, timeframe))
        .unwrap_or_else(default_venue_divergence_inputs);
    let bybit_divergence = input
        .bybit
        .as_ref()
        .map(|v| venue_divergence_inputs(v, timeframe))
        .unwrap_or_else(default_venue_divergence_inputs);

    let divergence = evaluate_scenario(&ExchangeDivergenceInputs {
        timeframe,
        price_move,
        binance: binance_divergence,
        bybit: bybit_divergence,
    });

    let primary_funding_rate = primary.snapshot.funding_rate_avg_pct.unwrap_or(Decimal::ZERO);
    let primary_funding_z = venue_funding_z(primary);
    let primary_funding = classify_funding_level(primary_funding_rate, primary_funding_z);

    let regime = detect_regime(&RegimeInputs {
        price_move,
        binance_oi_move: binance_divergence.oi_move,
        bybit_oi_move: bybit_divergence.oi_move,
        funding_bias: primary_funding.bias,
        cvd_sign: CvdSign::from_value(primary.snapshot.cvd),
        scenario: divergence.scenario,
    });

    let (structure_bias, structure_confidence) = structure_signal_inputs(&structure, price);
    let (val, vah) = volume_profile
        .as_ref()
        .map(|vp| (vp.val, vp.vah))
        .unwrap_or((price, price));
    let trend_up = technical.trend == TrendDirection::Up;
    let trend_down = technical.trend == TrendDirection::Down;

    let resolution_matches = primary.snapshot.cvd_resolution == timeframe;
    let requested_matches = primary.snapshot.cvd_requested_timeframe == timeframe;

    let signals = vec![
        exchange_divergence_signal(divergence.bias.as_bias(), divergence.confidence),
        market_regime_signal(regime.regime.bias_hint(), regime.confidence),
        structure_signal(structure_bias, structure_confidence),
        volume_profile_signal(price, val, vah),
        technical_signal(technical.ema_fast, technical.ema_slow, trend_up, trend_down),
        funding_signal(primary_funding.bias, primary_funding_z),
        cvd_signal(
            primary.snapshot.cvd,
            primary.snapshot.cvd_normalized,
            resolution_matches,
            requested_matches,
            primary.snapshot.cvd_reliable_for_tf,
        ),
    ];

    let regime_family = regime.regime.family();
    let regime_is_avoid_family = matches!(regime_family, "trap" | "range" | "covering");
    let regime_is_defensive_family = matches!(regime_family, "trap" | "covering" | "distribution");
    let synchronized_healthy_trending = matches!(
        regime.regime,
        crate::domain::market::regime::Regime::TrendingHealthyBull
            | crate::domain::market::regime::Regime::TrendingHealthyBear
    );

    let decision = make_decision(
        &signals,
        regime_is_avoid_family,
        regime_is_defensive_family,
        synchronized_healthy_trending,
    );

    let mut reasoning: Vec<String> = signals.iter().filter_map(|s: &WeightedSignal| s.warning.map(str::to_string)).collect();
    reasoning.extend(divergence.warnings.clone());

    let final_decision = FinalDecision {
        bias: decision.bias,
        confidence: decision.confidence,
        confidence_type: decision.confidence_type,
        scores: decision.scores,
        signals,
        reasoning,
        trade_stance: decision.trade_stance,
        primary_regime: regime_key(regime.regime),
        risk_mode: decision.risk_mode,
        macro_anchored: false,
        warning: None,
        macro_override: None,
    };

    let binance_move = binance_divergence.oi_move;
    let bybit_move = bybit_divergence.oi_move;
    let ratio = whale_retail_ratio(
        bybit_divergence.oi_delta_pct,
        binance_divergence.oi_delta_pct,
        bybit_divergence.oi_usd,
        timeframe,
    );

    Some(TimeframeMetrics {
        interval: timeframe,
        exchange_divergence: divergence,
        market_regime: regime,
        technical,
        funding_advanced: FundingAdvanced {
            classification: primary_funding,
            z_score: primary_funding_z,
            pain_index: pain_index(primary.snapshot.funding_rate_avg_pct, primary.snapshot.oi),
        },
        oi_advanced: OiAdvanced {
            binance_move,
            bybit_move,
            whale_retail_ratio: ratio,
        },
        volume_profile,
        structure,
        final_decision,
    })
}

/// `full` if every supplied timeframe has both venues present and
/// non-stale; `partial` if at least one timeframe is full but at least one
/// isn't; `degraded` if none are (§10).
fn compute_data_quality(inputs: &[(Timeframe, TimeframeInput)]) -> DataQuality {
    let mut any_full = false;
    let mut any_not_full = false;
    for (_, input) in inputs {
        let binance_full = input.binance.as_ref().map(|v| !v.snapshot.stale).unwrap_or(false);
        let bybit_full = input.bybit.as_ref().map(|v| !v.snapshot.stale).unwrap_or(false);
        if binance_full && bybit_full {
            any_full = true;
        } else {
            any_not_full = true;
        }
    }
    if any_full && !any_not_full {
        DataQuality::Full
    } else if any_full {
        DataQuality::Partial
    } else {
        DataQuality::Degraded
    }
}

/// Builds the full cross-timeframe `MarketState` for `symbol` at
/// `timestamp`, running the per-timeframe pipeline over `inputs` and then
/// aggregating (§4.3.8). Returns `None` only if every timeframe was dropped
/// for missing both venues.
pub fn build_market_state(
    symbol: &str,
    timestamp: i64,
    primary_timeframe: Timeframe,
    price: Decimal,
    inputs: Vec<(Timeframe, TimeframeInput)>,
) -> Option<MarketState> {
    let mut per_tf_metrics = Vec::new();
    let mut decisions = Vec::new();
    let mut warnings = Vec::new();

    for (tf, input) in &inputs {
        match build_timeframe_metrics(*tf, input) {
            Some(metrics) => {
                decisions.push(PerTimeframeDecision {
                    timeframe: *tf,
                    scores: metrics.final_decision.scores.clone(),
                    bias: metrics.final_decision.bias,
                    confidence: metrics.final_decision.confidence,
                });
                per_tf_metrics.push(metrics);
            }
            None => warnings.push(format!("{tf}: both venues missing, timeframe dropped")),
        }
    }

    if per_tf_metrics.is_empty() {
        return None;
    }

    let aggregated = aggregate(&decisions);
    let macro_summary = summarize_bucket(BucketName::Macro, &decisions);
    let scalping_summary = summarize_bucket(BucketName::Scalping, &decisions);
    let (aggregated, macro_anchored, macro_warning) = match &macro_summary {
        Some(macro_summary) => apply_macro_hierarchy(macro_summary, scalping_summary.as_ref(), aggregated),
        None => (aggregated, false, None),
    };
    if let Some(warning) = &macro_warning {
        warnings.push(warning.clone());
    }

    let primary_metrics = per_tf_metrics
        .iter()
        .find(|m| m.interval == primary_timeframe)
        .or_else(|| per_tf_metrics.first())?
        .clone();

    let final_decision = FinalDecision {
        bias: aggregated.bias,
        confidence: aggregated.confidence,
        confidence_type: if aggregated.bias == FinalBias::Wait {
            ConfidenceType::NoTrade
        } else {
            ConfidenceType::Directional
        },
        scores: ScoredSignals {
            long: aggregated.long,
            short: aggregated.short,
            wait: aggregated.wait,
            active_weight: Decimal::ONE,
            direction_confidence: aggregated.confidence,
            conflict_bonus: Decimal::ZERO,
            no_trade_confidence: aggregated.confidence,
        },
        signals: Vec::new(),
        reasoning: aggregated.reasoning.clone(),
        trade_stance: primary_metrics.final_decision.trade_stance,
        primary_regime: primary_metrics.final_decision.primary_regime.clone(),
        risk_mode: primary_metrics.final_decision.risk_mode,
        macro_anchored,
        warning: macro_warning,
        macro_override: aggregated.macro_override.clone(),
    };

    let timeframe_buckets: Vec<BucketSummary> = [BucketName::Macro, BucketName::Micro, BucketName::Scalping]
        .into_iter()
        .filter_map(|bucket| summarize_bucket(bucket, &decisions))
        .collect();

    let data_quality = compute_data_quality(&inputs);

    Some(MarketState {
        timestamp,
        symbol: symbol.to_string(),
        primary_timeframe,
        price,
        final_decision,
        exchange_divergence: primary_metrics.exchange_divergence,
        market_regime: primary_metrics.market_regime,
        technical: primary_metrics.technical,
        funding_advanced: primary_metrics.funding_advanced,
        oi_advanced: primary_metrics.oi_advanced,
        volume_profile: primary_metrics.volume_profile,
        structure: primary_metrics.structure,
        timeframes: per_tf_metrics,
        timeframe_buckets,
        data_quality,
        warnings,
        outcome_label: None,
    })
}
