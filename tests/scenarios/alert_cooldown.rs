//! Alert cooldown (§4.4), exercised at the integration level: real
//! `MarketState`s produced by `build_market_state` (not the hand-built
//! fixture `alert_engine.rs`'s own unit tests use) fed through `AlertEngine`.
//! A bias/regime shift fires once, a repeat within the cooldown window is
//! suppressed, and hydrating from alert history carries the cooldown across
//! a simulated process restart.

use crate::common::{FakeAlertRepository, baseline_timeframe_input, whale_distribution_timeframe_input};
use btc_sentinel::application::alert_engine::AlertEngine;
use btc_sentinel::application::metrics_engine::build_market_state;
use btc_sentinel::domain::alerts::AlertCategory;
use btc_sentinel::domain::market::decision::FinalBias;
use btc_sentinel::domain::market::state::MarketState;
use btc_sentinel::domain::market::timeframe::Timeframe;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn quiet_state(timestamp: i64) -> MarketState {
    let input = baseline_timeframe_input(Timeframe::H4, dec!(60_000));
    build_market_state("BTCUSDT", timestamp, Timeframe::H4, dec!(60_000), vec![(Timeframe::H4, input)]).unwrap()
}

fn distribution_state(timestamp: i64) -> MarketState {
    let input = whale_distribution_timeframe_input(Timeframe::H4, dec!(60_000));
    build_market_state("BTCUSDT", timestamp, Timeframe::H4, dec!(60_000), vec![(Timeframe::H4, input)]).unwrap()
}

#[test]
fn whale_distribution_entry_fires_bias_shift_and_regime_change_once() {
    let baseline = quiet_state(0);
    assert_eq!(baseline.final_decision.bias, FinalBias::Wait);
    assert_eq!(baseline.final_decision.primary_regime, "range.chop");

    let shifted = distribution_state(1_000);
    assert_eq!(shifted.final_decision.bias, FinalBias::Short);
    assert_eq!(shifted.final_decision.primary_regime, "distribution.whale_exit");

    let mut engine = AlertEngine::new(Arc::new(FakeAlertRepository::new(Vec::new())));
    engine.evaluate("BTCUSDT", None, &baseline, 0);
    let alerts = engine.evaluate("BTCUSDT", Some(&baseline), &shifted, 1_000);

    assert!(alerts.iter().any(|a| a.category == AlertCategory::BiasShift));
    assert!(alerts.iter().any(|a| a.category == AlertCategory::RegimeChange));
}

#[test]
fn a_second_shift_within_the_cooldown_window_is_suppressed() {
    let mut engine = AlertEngine::new(Arc::new(FakeAlertRepository::new(Vec::new())));
    let baseline = quiet_state(0);
    let shifted = distribution_state(1_000);

    engine.evaluate("BTCUSDT", None, &baseline, 0);
    let first = engine.evaluate("BTCUSDT", Some(&baseline), &shifted, 1_000);
    assert!(first.iter().any(|a| a.category == AlertCategory::BiasShift));

    // Back to the quiet baseline, 5 minutes later: well within BIAS_SHIFT's
    // 30-minute cooldown.
    let reverted = quiet_state(1_000 + 5 * 60_000);
    let second = engine.evaluate("BTCUSDT", Some(&shifted), &reverted, 1_000 + 5 * 60_000);
    assert!(!second.iter().any(|a| a.category == AlertCategory::BiasShift), "still inside the bias-shift cooldown");
}

#[tokio::test]
async fn hydrating_from_persisted_alert_history_carries_the_cooldown_across_a_restart() {
    let baseline = quiet_state(0);
    let shifted = distribution_state(1_000);

    // First process: fires and persists the bias-shift alert.
    let repository = Arc::new(FakeAlertRepository::new(Vec::new()));
    let mut first_process = AlertEngine::new(repository.clone());
    first_process.hydrate("BTCUSDT", 0).await.unwrap();
    first_process.evaluate_and_persist("BTCUSDT", None, &baseline, 0).await.unwrap();
    let fired = first_process.evaluate_and_persist("BTCUSDT", Some(&baseline), &shifted, 1_000).await.unwrap();
    assert!(fired.iter().any(|a| a.category == AlertCategory::BiasShift));

    // Second process: rehydrates from the same persisted history, so a
    // reverting shift 5 minutes later (well inside the 30-minute window) is
    // still suppressed even though this is a brand-new `AlertEngine`.
    let history = repository.saved.lock().unwrap().clone();
    let restarted_repository = Arc::new(FakeAlertRepository::new(history));
    let mut second_process = AlertEngine::new(restarted_repository);
    second_process.hydrate("BTCUSDT", 0).await.unwrap();

    let reverted = quiet_state(1_000 + 5 * 60_000);
    let alerts = second_process.evaluate("BTCUSDT", Some(&shifted), &reverted, 1_000 + 5 * 60_000);
    assert!(!alerts.iter().any(|a| a.category == AlertCategory::BiasShift), "cooldown should survive rehydration");
}
