//! Dedup idempotence (§4.5): two `insert_if_absent` calls for the same
//! `(symbol, timeBucket)` key only ever write once. The in-memory cache in
//! `StateStore` should short-circuit the second call without even reaching
//! the repository; `FakeStateStoreRepository` counts its own calls so the
//! test can tell the cache-hit path from the repository's own dedup.

use crate::common::{FakeStateStoreRepository, base_snapshot, flat_candles, timeframe_input, venue_input};
use btc_sentinel::application::metrics_engine::build_market_state;
use btc_sentinel::application::state_store::StateStore;
use btc_sentinel::domain::market::timeframe::Timeframe;
use btc_sentinel::domain::repositories::StateStoreRepository;
use btc_sentinel::domain::venue::Venue;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn one_timeframe_state(timestamp: i64) -> btc_sentinel::domain::market::state::MarketState {
    let candles = flat_candles(Venue::BinanceUsdtPerp, "BTCUSDT", Timeframe::H1, dec!(60_000), 40);
    let snapshot = base_snapshot(Venue::BinanceUsdtPerp, Timeframe::H1, dec!(60_000));
    let input = timeframe_input(Some(venue_input(snapshot, candles)), None);
    build_market_state("BTCUSDT", timestamp, Timeframe::H1, dec!(60_000), vec![(Timeframe::H1, input)]).unwrap()
}

#[tokio::test]
async fn second_insert_in_the_same_scan_cycle_bucket_is_a_no_op() {
    let repository = Arc::new(FakeStateStoreRepository::new());
    let store = StateStore::new(repository.clone(), 300_000);

    let state = one_timeframe_state(1_000_000_000);
    assert!(store.insert_if_absent(&state, 1_000_000_000).await.unwrap());
    assert!(!store.insert_if_absent(&state, 1_000_000_001).await.unwrap());

    // The in-memory cache should have stopped the second call before it
    // ever reached the repository.
    assert_eq!(repository.insert_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_new_time_bucket_is_not_deduped_against_the_previous_one() {
    let repository = Arc::new(FakeStateStoreRepository::new());
    let store = StateStore::new(repository.clone(), 300_000);

    let first = one_timeframe_state(1_000_000_000);
    let second = one_timeframe_state(1_000_300_000);

    assert!(store.insert_if_absent(&first, 1_000_000_000).await.unwrap());
    assert!(store.insert_if_absent(&second, 1_000_300_000).await.unwrap());
    assert_eq!(repository.insert_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rehydrating_from_the_repository_seeds_the_dedup_cache() {
    let repository = Arc::new(FakeStateStoreRepository::new());
    let state = one_timeframe_state(1_000_000_000);
    repository.insert_if_absent(&state, 300_000).await.unwrap();

    let store = StateStore::new(repository.clone(), 300_000);
    store.hydrate("BTCUSDT", 1_000_000_500).await.unwrap();

    // The cache was seeded from the repository's latest row, so a redundant
    // insert for the same bucket never reaches the repository again.
    assert!(!store.insert_if_absent(&state, 1_000_000_600).await.unwrap());
    assert_eq!(repository.insert_calls.load(Ordering::SeqCst), 1);
}
