//! Data Service (§4.2): turns vendor/historical candles into the
//! `TimeframeInput` the Metrics Engine consumes, for both live and replay
//! cycles. Owns CVD windowing, staleness detection and the vendor rate
//! limit; partial failures drop a venue rather than failing the cycle.

use crate::application::metrics_engine::{TimeframeInput, VenueTimeframeInput};
use crate::domain::errors::EngineError;
use crate::domain::market::candle::Candle;
use crate::domain::market::cvd::compute_cvd;
use crate::domain::market::snapshot::PerTimeframeSnapshot;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::{VendorClient, VendorRequest};
use crate::domain::repositories::CandleRepository;
use crate::domain::venue::Venue;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Candles fetched per `(venue, timeframe)` on every cycle: enough to cover
/// the widest CVD window (48, on `M30`) plus slack for technical/structure
/// math.
const LOOKBACK_CANDLES: usize = 60;
const MIN_CANDLES_REQUIRED: usize = 30;
/// Funding-rate points kept for the z-score history.
const FUNDING_HISTORY_LEN: usize = 20;
/// `maxLagMultiplier` of §4.2: a series is stale once its newest candle is
/// older than this multiple of its own interval.
const MAX_LAG_MULTIPLIER: i64 = 2;

/// Merges the four per-endpoint vendor series into one `Candle` row per
/// timestamp. The price series carries OHLC/volume; OI, funding and taker
/// buy/sell rows are overlaid onto whatever price row shares their
/// timestamp, creating a blank row if the price series was missing it.
fn merge_candle_series(
    venue: Venue,
    symbol: &str,
    interval: Timeframe,
    price: Vec<Candle>,
    oi: Vec<Candle>,
    funding: Vec<Candle>,
    volume: Vec<Candle>,
) -> Vec<Candle> {
    let blank = |timestamp: i64| Candle {
        venue,
        symbol: symbol.to_string(),
        interval,
        timestamp,
        open: Decimal::ZERO,
        high: Decimal::ZERO,
        low: Decimal::ZERO,
        close: Decimal::ZERO,
        volume: None,
        oi: None,
        funding_rate: None,
        buy_volume: None,
        sell_volume: None,
    };

    let mut merged: BTreeMap<i64, Candle> = BTreeMap::new();
    for c in price {
        merged.insert(c.timestamp, c);
    }
    for c in oi {
        merged.entry(c.timestamp).or_insert_with(|| blank(c.timestamp)).oi = c.oi;
    }
    for c in funding {
        merged.entry(c.timestamp).or_insert_with(|| blank(c.timestamp)).funding_rate = c.funding_rate;
    }
    for c in volume {
        let row = merged.entry(c.timestamp).or_insert_with(|| blank(c.timestamp));
        row.buy_volume = c.buy_volume;
        row.sell_volume = c.sell_volume;
        if row.volume.is_none() {
            row.volume = c.volume;
        }
    }
    merged.into_values().collect()
}

fn funding_history(candles: &[Candle]) -> Vec<Decimal> {
    candles
        .iter()
        .filter_map(|c| c.funding_rate)
        .rev()
        .take(FUNDING_HISTORY_LEN)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

/// Builds the `PerTimeframeSnapshot` from a merged, ascending-sorted candle
/// series and the timestamp the cycle is evaluated as-of.
fn build_snapshot(interval: Timeframe, candles: &[Candle], as_of: i64) -> Option<PerTimeframeSnapshot> {
    let last = candles.last()?;
    let previous = if candles.len() >= 2 { candles.get(candles.len() - 2) } else { None };

    let price = last.close;
    let price_change_pct = previous.and_then(|p| last.pct_change_from(p)).unwrap_or(Decimal::ZERO);
    let oi = last.oi;
    let oi_change_pct = match (last.oi, previous.and_then(|p| p.oi)) {
        (Some(cur), Some(prev)) if !prev.is_zero() => Some((cur - prev) / prev * Decimal::ONE_HUNDRED),
        _ => None,
    };
    let volume = last.volume;
    let history = funding_history(candles);
    let funding_rate_avg_pct = if history.is_empty() {
        None
    } else {
        Some(history.iter().copied().sum::<Decimal>() / Decimal::from(history.len()))
    };

    let cvd = compute_cvd(interval, candles);

    let age_minutes = (as_of - last.timestamp) as f64 / 60_000.0;
    let stale = (as_of - last.timestamp) > interval.interval_ms() * MAX_LAG_MULTIPLIER;

    Some(PerTimeframeSnapshot {
        venue: last.venue,
        interval,
        price,
        price_change_pct,
        oi,
        oi_change_pct,
        volume,
        funding_rate_avg_pct,
        cvd: cvd.cvd,
        cvd_delta: cvd.cvd_delta,
        cvd_normalized: cvd.cvd_normalized,
        cvd_resolution: interval,
        cvd_requested_timeframe: interval,
        cvd_window_candles: interval.cvd_window().0,
        cvd_actual_candles: cvd.actual_candles,
        cvd_data_complete: cvd.data_complete,
        cvd_market_impact_reliable: cvd.market_impact_reliable,
        cvd_reliable_for_tf: cvd.reliable_for_tf,
        cvd_data_reason: cvd.data_reason,
        cvd_market_reason: cvd.market_reason,
        cvd_total_volume: cvd.total_volume,
        cvd_avg_volume_per_candle: cvd.avg_volume_per_candle,
        stale,
        age_minutes: Some(age_minutes),
    })
}

pub struct DataService {
    vendor: Arc<dyn VendorClient>,
    candle_repository: Arc<dyn CandleRepository>,
    symbol: String,
    inter_call_delay: Duration,
}

impl DataService {
    pub fn new(vendor: Arc<dyn VendorClient>, candle_repository: Arc<dyn CandleRepository>, symbol: String, inter_call_delay: Duration) -> Self {
        Self { vendor, candle_repository, symbol, inter_call_delay }
    }

    fn request(&self, venue: Venue, interval: Timeframe, limit: usize, end_time: Option<i64>) -> VendorRequest {
        VendorRequest {
            venue,
            symbol: self.symbol.clone(),
            interval,
            limit,
            start_time: None,
            end_time,
        }
    }

    /// Four vendor calls (price/OI/funding/taker-volume), each separated by
    /// `inter_call_delay` (§4.2 rate limiting), merged into one candle
    /// series and persisted to the Historical-Candle Store.
    async fn fetch_and_store(&self, venue: Venue, interval: Timeframe, limit: usize, end_time: Option<i64>) -> Result<Vec<Candle>, EngineError> {
        let price = self.vendor.price(self.request(venue, interval, limit, end_time)).await?;
        tokio::time::sleep(self.inter_call_delay).await;

        let oi = self.vendor.open_interest(self.request(venue, interval, limit, end_time)).await?;
        tokio::time::sleep(self.inter_call_delay).await;

        let funding = self.vendor.funding(self.request(venue, interval, limit, end_time)).await?;
        tokio::time::sleep(self.inter_call_delay).await;

        let volume = self.vendor.taker_buy_sell_volume(self.request(venue, interval, limit, end_time)).await?;
        tokio::time::sleep(self.inter_call_delay).await;

        let merged = merge_candle_series(venue, &self.symbol, interval, price, oi, funding, volume);
        self.candle_repository.upsert_many(&merged).await?;
        Ok(merged)
    }

    async fn build_venue_input(&self, venue: Venue, interval: Timeframe, as_of: i64, end_time: Option<i64>) -> Option<VenueTimeframeInput> {
        match self.fetch_and_store(venue, interval, LOOKBACK_CANDLES, end_time).await {
            Ok(candles) if candles.len() >= MIN_CANDLES_REQUIRED => {
                let snapshot = build_snapshot(interval, &candles, as_of)?;
                let funding_rate_history = funding_history(&candles);
                Some(VenueTimeframeInput { snapshot, candles, funding_rate_history })
            }
            Ok(candles) => {
                warn!(venue = %venue, interval = %interval, got = candles.len(), need = MIN_CANDLES_REQUIRED, "insufficient candles, dropping venue for timeframe");
                None
            }
            Err(err) => {
                warn!(venue = %venue, interval = %interval, error = %err, "vendor call failed, dropping venue for timeframe");
                None
            }
        }
    }

    /// Builds the live `TimeframeInput` for `interval`: both venues fetched
    /// sequentially (never concurrently, so the inter-call delay applies
    /// uniformly), a missing or failing venue is simply absent from the
    /// result rather than failing the whole timeframe (§4.2 partial-failure
    /// policy).
    pub async fn live_timeframe_input(&self, interval: Timeframe, as_of: i64) -> TimeframeInput {
        let binance = self.build_venue_input(Venue::BinanceUsdtPerp, interval, as_of, None).await;
        let bybit = self.build_venue_input(Venue::BybitCoinMarginedPerp, interval, as_of, None).await;
        TimeframeInput { binance, bybit }
    }

    pub async fn live_inputs(&self, as_of: i64) -> Vec<(Timeframe, TimeframeInput)> {
        let mut inputs = Vec::with_capacity(Timeframe::ALL.len());
        for interval in Timeframe::ALL {
            inputs.push((interval, self.live_timeframe_input(interval, as_of).await));
        }
        inputs
    }

    /// Loads a replay series for `(venue, interval)` from the
    /// Historical-Candle Store only, never touching the vendor. `end_time`
    /// is floored to the last fully closed candle boundary at or before
    /// `as_of`, and any row later than it is dropped even if present
    /// locally (no-lookahead, §4.2/§8). If the first window comes up short,
    /// the lookback is doubled once; still-insufficient data is a hard
    /// error rather than a silently degraded cycle.
    async fn replay_venue_candles(&self, venue: Venue, interval: Timeframe, as_of: i64) -> Result<Vec<Candle>, EngineError> {
        let end_time = interval.align_end_to_last_closed(as_of);
        let mut window = LOOKBACK_CANDLES;

        for attempt in 0..2 {
            let start_time = end_time - (window as i64) * interval.interval_ms();
            let mut candles = self.candle_repository.load_range(venue, &self.symbol, interval, start_time, end_time).await?;
            candles.retain(|c| c.timestamp <= end_time);

            if candles.len() >= MIN_CANDLES_REQUIRED {
                return Ok(candles);
            }
            if attempt == 0 {
                window *= 2;
                continue;
            }
            return Err(EngineError::InsufficientData {
                interval: interval.vendor_interval().to_string(),
                got: candles.len(),
                need: MIN_CANDLES_REQUIRED,
                context: format!("replay at {venue} widened window to {window} candles and still fell short"),
            });
        }
        unreachable!("loop always returns within two attempts")
    }

    async fn replay_venue_input(&self, venue: Venue, interval: Timeframe, as_of: i64) -> Result<Option<VenueTimeframeInput>, EngineError> {
        match self.replay_venue_candles(venue, interval, as_of).await {
            Ok(candles) => {
                let Some(snapshot) = build_snapshot(interval, &candles, as_of) else {
                    return Ok(None);
                };
                let funding_rate_history = funding_history(&candles);
                Ok(Some(VenueTimeframeInput { snapshot, candles, funding_rate_history }))
            }
            Err(EngineError::InsufficientData { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn replay_timeframe_input(&self, interval: Timeframe, as_of: i64) -> Result<TimeframeInput, EngineError> {
        let binance = self.replay_venue_input(Venue::BinanceUsdtPerp, interval, as_of).await?;
        let bybit = self.replay_venue_input(Venue::BybitCoinMarginedPerp, interval, as_of).await?;
        Ok(TimeframeInput { binance, bybit })
    }

    pub async fn replay_inputs(&self, as_of: i64) -> Result<Vec<(Timeframe, TimeframeInput)>, EngineError> {
        let mut inputs = Vec::with_capacity(Timeframe::ALL.len());
        for interval in Timeframe::ALL {
            inputs.push((interval, self.replay_timeframe_input(interval, as_of).await?));
        }
        Ok(inputs)
    }
}
