//! Cumulative Volume Delta (§4.2): the non-obvious per-timeframe windowing
//! contract plus the reliability gates that the decision engine trusts.

use crate::domain::market::candle::Candle;
use crate::domain::market::snapshot::{CvdDataReason, CvdMarketReason};
use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;

/// Result of computing CVD over the last `window_candles` taker rows for a
/// target timeframe. Carries every field `PerTimeframeSnapshot` needs from
/// the CVD engine so the Data Service only has to copy it across.
#[derive(Debug, Clone)]
pub struct CvdResult {
    pub cvd: Decimal,
    pub cvd_delta: Decimal,
    pub cvd_normalized: Decimal,
    pub actual_candles: usize,
    pub data_complete: bool,
    pub market_impact_reliable: bool,
    pub reliable_for_tf: bool,
    pub data_reason: Option<CvdDataReason>,
    pub market_reason: Option<CvdMarketReason>,
    pub total_volume: Decimal,
    pub avg_volume_per_candle: Decimal,
}

/// Longest run of candles (within the tail window) whose recorded volume is
/// exactly zero. Candles with `volume: None` do not count — "not recorded"
/// is a different failure mode than "recorded as zero", and only the latter
/// breaks up a reliability run per the CVD completeness contract.
fn longest_zero_volume_run(candles: &[Candle]) -> usize {
    let mut longest = 0usize;
    let mut current = 0usize;
    for c in candles {
        let is_zero = match (c.buy_volume, c.sell_volume) {
            (Some(b), Some(s)) => (b + s).is_zero(),
            _ => false,
        };
        if is_zero {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Computes CVD for `timeframe` over `candles`, which must already be the
/// vendor rows fetched at `timeframe.cvd_api_interval()` resolution, sorted
/// ascending, and truncated/available up to `timeframe.cvd_window().0` rows.
///
/// `requested_timeframe` is the timeframe the caller actually asked the Data
/// Service for CVD on; when it differs from `timeframe` (e.g. a coarser
/// resolution was substituted), `reliable_for_tf` is still computed from the
/// data itself — the *caller* (decision engine) is responsible for treating
/// a resolution mismatch as an independent gate per §4.3.7.
pub fn compute_cvd(timeframe: Timeframe, candles: &[Candle]) -> CvdResult {
    let (window_candles, min_candles) = timeframe.cvd_window();
    let start = candles.len().saturating_sub(window_candles);
    let window = &candles[start..];

    let mut cvd = Decimal::ZERO;
    let mut total_volume = Decimal::ZERO;
    for c in window {
        let buy = c.buy_volume.unwrap_or(Decimal::ZERO);
        let sell = c.sell_volume.unwrap_or(Decimal::ZERO);
        cvd += buy - sell;
        total_volume += buy + sell;
    }

    let cvd_delta = window
        .last()
        .map(|c| c.buy_volume.unwrap_or(Decimal::ZERO) - c.sell_volume.unwrap_or(Decimal::ZERO))
        .unwrap_or(Decimal::ZERO);

    let cvd_normalized = if total_volume.is_zero() {
        Decimal::ZERO
    } else {
        cvd / total_volume
    };

    let actual_candles = window.len();
    let zero_run = longest_zero_volume_run(window);
    let enough_candles = actual_candles >= min_candles;
    let data_complete = enough_candles && zero_run <= 3;
    let data_reason = if data_complete {
        None
    } else if !enough_candles {
        Some(CvdDataReason::InsufficientCandles)
    } else {
        Some(CvdDataReason::TooManyZeroVolumeCandles)
    };

    let avg_volume_per_candle = if actual_candles == 0 {
        Decimal::ZERO
    } else {
        total_volume / Decimal::from(actual_candles)
    };
    let market_impact_reliable = avg_volume_per_candle >= timeframe.min_volume_threshold_usd();
    let market_reason = if market_impact_reliable {
        None
    } else {
        Some(CvdMarketReason::BelowVolumeThreshold)
    };

    let reliable_for_tf = data_complete && market_impact_reliable;

    CvdResult {
        cvd,
        cvd_delta,
        cvd_normalized,
        actual_candles,
        data_complete,
        market_impact_reliable,
        reliable_for_tf,
        data_reason,
        market_reason,
        total_volume,
        avg_volume_per_candle,
    }
}
