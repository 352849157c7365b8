//! Shared fixtures for the scenario test suite: candle/snapshot/venue-input
//! builders plus in-memory fakes for the repository and vendor ports. Mirrors
//! the hand-built fixture style already used by the unit tests in
//! `metrics_engine.rs`, `alert_engine.rs` and `state_store.rs`.
#![allow(dead_code)]

use async_trait::async_trait;
use btc_sentinel::application::metrics_engine::{TimeframeInput, VenueTimeframeInput};
use btc_sentinel::domain::alerts::Alert;
use btc_sentinel::domain::errors::EngineError;
use btc_sentinel::domain::market::candle::Candle;
use btc_sentinel::domain::market::snapshot::PerTimeframeSnapshot;
use btc_sentinel::domain::market::state::{MarketState, OutcomeAssessment};
use btc_sentinel::domain::market::timeframe::Timeframe;
use btc_sentinel::domain::ports::{VendorClient, VendorRequest};
use btc_sentinel::domain::repositories::{AlertRepository, CandleRepository, StateStoreRepository};
use btc_sentinel::domain::venue::Venue;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A candle series with a constant close and a `[close-1, close+1]` range.
/// Flat enough that `detect_structure` finds no fractal swings and
/// `technical::summarize` finds zero slope and equal EMAs, so the
/// technical/structure/volume-profile signals all land on a neutral `Wait`
/// rather than leaking directional bias into a scenario fixture that only
/// wants the divergence/regime/funding/cvd signals driving the outcome.
pub fn flat_candles(venue: Venue, symbol: &str, interval: Timeframe, close: Decimal, count: usize) -> Vec<Candle> {
    (0..count as i64)
        .map(|i| Candle {
            venue,
            symbol: symbol.to_string(),
            interval,
            timestamp: i * interval.interval_ms(),
            open: close,
            high: close + Decimal::ONE,
            low: close - Decimal::ONE,
            close,
            volume: Some(dec!(1_000_000)),
            oi: Some(dec!(5_000_000_000)),
            funding_rate: Some(dec!(0.01)),
            buy_volume: Some(dec!(500_000)),
            sell_volume: Some(dec!(500_000)),
        })
        .collect()
}

/// A monotonically rising candle series, for scenarios that want the
/// technical/structure signals to actively lean long.
pub fn rising_candles(venue: Venue, symbol: &str, interval: Timeframe, start: Decimal, step: Decimal, count: usize) -> Vec<Candle> {
    (0..count as i64)
        .map(|i| {
            let close = start + step * Decimal::from(i);
            Candle {
                venue,
                symbol: symbol.to_string(),
                interval,
                timestamp: i * interval.interval_ms(),
                open: close - step,
                high: close + Decimal::ONE,
                low: close - step - Decimal::ONE,
                close,
                volume: Some(dec!(1_000_000)),
                oi: Some(dec!(5_000_000_000)),
                funding_rate: Some(dec!(0.01)),
                buy_volume: Some(dec!(700_000)),
                sell_volume: Some(dec!(300_000)),
            }
        })
        .collect()
}

/// A `PerTimeframeSnapshot` with every CVD gate satisfied by default
/// (resolution/requested timeframe match, reliable), fresh (not stale), for
/// a caller to override the fields a given scenario cares about.
pub fn base_snapshot(venue: Venue, interval: Timeframe, price: Decimal) -> PerTimeframeSnapshot {
    PerTimeframeSnapshot {
        venue,
        interval,
        price,
        price_change_pct: Decimal::ZERO,
        oi: Some(dec!(5_000_000_000)),
        oi_change_pct: Some(Decimal::ZERO),
        volume: Some(dec!(1_000_000)),
        funding_rate_avg_pct: Some(dec!(0.01)),
        cvd: Decimal::ZERO,
        cvd_delta: Decimal::ZERO,
        cvd_normalized: Decimal::ZERO,
        cvd_resolution: interval,
        cvd_requested_timeframe: interval,
        cvd_window_candles: interval.cvd_window().0,
        cvd_actual_candles: interval.cvd_window().0,
        cvd_data_complete: true,
        cvd_market_impact_reliable: true,
        cvd_reliable_for_tf: true,
        cvd_data_reason: None,
        cvd_market_reason: None,
        cvd_total_volume: dec!(1_000_000),
        cvd_avg_volume_per_candle: dec!(40_000),
        stale: false,
        age_minutes: Some(1.0),
    }
}

pub fn venue_input(snapshot: PerTimeframeSnapshot, candles: Vec<Candle>) -> VenueTimeframeInput {
    VenueTimeframeInput { snapshot, candles, funding_rate_history: vec![dec!(0.01); 20] }
}

pub fn timeframe_input(binance: Option<VenueTimeframeInput>, bybit: Option<VenueTimeframeInput>) -> TimeframeInput {
    TimeframeInput { binance, bybit }
}

/// An entirely flat, two-venue `TimeframeInput`: zero price/OI change, zero
/// CVD on both venues, flat candles. Every signal lands on `Wait` — the
/// quiet baseline a scenario fixture diffs away from.
pub fn baseline_timeframe_input(interval: Timeframe, price: Decimal) -> TimeframeInput {
    let binance_candles = flat_candles(Venue::BinanceUsdtPerp, "BTCUSDT", interval, price, 40);
    let bybit_candles = flat_candles(Venue::BybitCoinMarginedPerp, "BTCUSDT", interval, price, 40);
    timeframe_input(
        Some(venue_input(base_snapshot(Venue::BinanceUsdtPerp, interval, price), binance_candles)),
        Some(venue_input(base_snapshot(Venue::BybitCoinMarginedPerp, interval, price), bybit_candles)),
    )
}

/// A `TimeframeInput` shaped to match spec scenario 1 (whale distribution):
/// price up strong, bybit OI down strong, binance OI up, bybit CVD reliable,
/// binance CVD negative — the exact `evaluate_scenario` branch that returns
/// `WhaleDistribution` at confidence 8.5 / `StrongShort`. Candles are flat so
/// the technical/structure/volume-profile signals stay neutral and don't
/// inject unintended bias; only the divergence/regime/cvd signals drive the
/// resulting decision.
pub fn whale_distribution_timeframe_input(interval: Timeframe, price: Decimal) -> TimeframeInput {
    let binance_candles = flat_candles(Venue::BinanceUsdtPerp, "BTCUSDT", interval, price, 40);
    let bybit_candles = flat_candles(Venue::BybitCoinMarginedPerp, "BTCUSDT", interval, price, 40);

    let mut binance_snapshot = base_snapshot(Venue::BinanceUsdtPerp, interval, price);
    binance_snapshot.price_change_pct = dec!(5.0);
    binance_snapshot.oi_change_pct = Some(dec!(5.0));
    binance_snapshot.cvd = dec!(-50_000);
    binance_snapshot.cvd_normalized = dec!(-0.5);

    let mut bybit_snapshot = base_snapshot(Venue::BybitCoinMarginedPerp, interval, price);
    bybit_snapshot.oi_change_pct = Some(dec!(-5.0));

    timeframe_input(
        Some(venue_input(binance_snapshot, binance_candles)),
        Some(venue_input(bybit_snapshot, bybit_candles)),
    )
}

/// In-memory `CandleRepository`: upsert-on-conflict keyed by
/// `(venue, symbol, interval, timestamp)`, matching the real store's
/// contract of never mutating a row once written except on that key.
pub struct FakeCandleRepository {
    rows: Mutex<Vec<Candle>>,
}

impl FakeCandleRepository {
    pub fn new(rows: Vec<Candle>) -> Self {
        Self { rows: Mutex::new(rows) }
    }
}

#[async_trait]
impl CandleRepository for FakeCandleRepository {
    async fn upsert_many(&self, candles: &[Candle]) -> Result<(), EngineError> {
        let mut rows = self.rows.lock().unwrap();
        for incoming in candles {
            match rows.iter_mut().find(|c| c.key() == incoming.key()) {
                Some(existing) => *existing = incoming.clone(),
                None => rows.push(incoming.clone()),
            }
        }
        Ok(())
    }

    async fn load_range(
        &self,
        venue: Venue,
        symbol: &str,
        interval: Timeframe,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<Candle>, EngineError> {
        let mut matched: Vec<Candle> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.venue == venue && c.symbol == symbol && c.interval == interval && c.timestamp >= start_time && c.timestamp <= end_time)
            .cloned()
            .collect();
        matched.sort_by_key(|c| c.timestamp);
        Ok(matched)
    }
}

/// A `VendorClient` that panics on every call, proving a code path never
/// reaches the vendor (used by the no-lookahead replay test).
pub struct PanicVendorClient;

#[async_trait]
impl VendorClient for PanicVendorClient {
    async fn price(&self, _request: VendorRequest) -> Result<Vec<Candle>, EngineError> {
        panic!("replay must never call the vendor (price)")
    }
    async fn open_interest(&self, _request: VendorRequest) -> Result<Vec<Candle>, EngineError> {
        panic!("replay must never call the vendor (open_interest)")
    }
    async fn funding(&self, _request: VendorRequest) -> Result<Vec<Candle>, EngineError> {
        panic!("replay must never call the vendor (funding)")
    }
    async fn taker_buy_sell_volume(&self, _request: VendorRequest) -> Result<Vec<Candle>, EngineError> {
        panic!("replay must never call the vendor (taker_buy_sell_volume)")
    }
}

/// In-memory `StateStoreRepository` that additionally counts how many times
/// `insert_if_absent` actually reached the repository, so a dedup test can
/// tell the difference between "the cache short-circuited" and "the
/// repository itself deduplicated".
pub struct FakeStateStoreRepository {
    states: Mutex<Vec<(MarketState, i64)>>,
    pub insert_calls: AtomicUsize,
}

impl FakeStateStoreRepository {
    pub fn new() -> Self {
        Self { states: Mutex::new(Vec::new()), insert_calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl StateStoreRepository for FakeStateStoreRepository {
    async fn insert_if_absent(&self, state: &MarketState, scan_cycle_ms: i64) -> Result<bool, EngineError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        let bucket = state.time_bucket(scan_cycle_ms);
        let mut states = self.states.lock().unwrap();
        if states.iter().any(|(s, b)| s.symbol == state.symbol && *b == bucket) {
            return Ok(false);
        }
        states.push((state.clone(), bucket));
        Ok(true)
    }

    async fn load_latest(&self, symbol: &str) -> Result<Option<MarketState>, EngineError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s.symbol == symbol)
            .max_by_key(|(s, _)| s.timestamp)
            .map(|(s, _)| s.clone()))
    }

    async fn load_unlabeled_older_than(&self, symbol: &str, horizon_cutoff: i64) -> Result<Vec<MarketState>, EngineError> {
        Ok(self
            .states
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s.symbol == symbol && s.outcome_label.is_none() && s.timestamp <= horizon_cutoff)
            .map(|(s, _)| s.clone())
            .collect())
    }

    async fn apply_outcome_label(&self, symbol: &str, time_bucket: i64, outcome: &OutcomeAssessment) -> Result<(), EngineError> {
        let mut states = self.states.lock().unwrap();
        if let Some((state, _)) = states.iter_mut().find(|(s, b)| s.symbol == symbol && *b == time_bucket) {
            state.outcome_label = Some(outcome.clone());
        }
        Ok(())
    }
}

/// In-memory `AlertRepository`: `history` seeds `load_since` (for hydration
/// tests), `saved` accumulates everything `save_many` has been given.
pub struct FakeAlertRepository {
    pub saved: Mutex<Vec<Alert>>,
    pub history: Vec<Alert>,
}

impl FakeAlertRepository {
    pub fn new(history: Vec<Alert>) -> Self {
        Self { saved: Mutex::new(Vec::new()), history }
    }
}

#[async_trait]
impl AlertRepository for FakeAlertRepository {
    async fn save_many(&self, _symbol: &str, alerts: &[Alert]) -> Result<(), EngineError> {
        self.saved.lock().unwrap().extend_from_slice(alerts);
        Ok(())
    }

    async fn load_since(&self, _symbol: &str, _since: i64) -> Result<Vec<Alert>, EngineError> {
        Ok(self.history.clone())
    }
}
