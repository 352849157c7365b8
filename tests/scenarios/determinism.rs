//! Determinism: identical inputs through `build_market_state` twice produce
//! byte-identical output. `MarketState` doesn't derive `PartialEq` (nested
//! `Decimal`/enum trees), so the comparison goes through its JSON form,
//! which is also how the State Store and the stable outbound contract (§6)
//! serialize it.

use crate::common::{base_snapshot, flat_candles, timeframe_input, venue_input};
use btc_sentinel::application::metrics_engine::build_market_state;
use btc_sentinel::domain::market::timeframe::Timeframe;
use btc_sentinel::domain::venue::Venue;
use rust_decimal_macros::dec;

fn sample_inputs() -> Vec<(Timeframe, btc_sentinel::application::metrics_engine::TimeframeInput)> {
    let mut inputs = Vec::new();
    for tf in [Timeframe::M30, Timeframe::H1, Timeframe::H4, Timeframe::D1] {
        let candles = flat_candles(Venue::BinanceUsdtPerp, "BTCUSDT", tf, dec!(60_000), 40);
        let mut snapshot = base_snapshot(Venue::BinanceUsdtPerp, tf, dec!(60_000));
        snapshot.price_change_pct = dec!(0.2);
        inputs.push((tf, timeframe_input(Some(venue_input(snapshot, candles)), None)));
    }
    inputs
}

#[test]
fn identical_inputs_produce_identical_state() {
    let a = build_market_state("BTCUSDT", 1_700_000_000_000, Timeframe::H1, dec!(60_000), sample_inputs()).unwrap();
    let b = build_market_state("BTCUSDT", 1_700_000_000_000, Timeframe::H1, dec!(60_000), sample_inputs()).unwrap();

    let json_a = serde_json::to_string(&a).unwrap();
    let json_b = serde_json::to_string(&b).unwrap();
    assert_eq!(json_a, json_b);
}

#[test]
fn rerunning_the_same_cycle_twice_does_not_change_the_aggregated_bias_or_confidence() {
    let a = build_market_state("BTCUSDT", 1_700_000_000_000, Timeframe::H1, dec!(60_000), sample_inputs()).unwrap();
    let b = build_market_state("BTCUSDT", 1_700_000_000_000, Timeframe::H1, dec!(60_000), sample_inputs()).unwrap();

    assert_eq!(a.final_decision.bias, b.final_decision.bias);
    assert_eq!(a.final_decision.confidence, b.final_decision.confidence);
    assert_eq!(a.timeframes.len(), b.timeframes.len());
}
