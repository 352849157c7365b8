//! `PerTimeframeSnapshot` and `LookbackHistory` (§3): the Data Service's
//! output and the Metrics Engine's input.

use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::venue::Venue;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why `cvdDataComplete` is false, for diagnostics/warnings. `None` when
/// `cvdDataComplete` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CvdDataReason {
    InsufficientCandles,
    TooManyZeroVolumeCandles,
}

/// Why `cvdMarketImpactReliable` is false. `None` when it is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CvdMarketReason {
    BelowVolumeThreshold,
}

/// A fully-derived, immutable snapshot for one `(venue, interval)` pair.
///
/// Invariant: `cvd_reliable_for_tf == cvd_data_complete && cvd_market_impact_reliable`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerTimeframeSnapshot {
    pub venue: Venue,
    pub interval: Timeframe,
    pub price: Decimal,
    pub price_change_pct: Decimal,
    pub oi: Option<Decimal>,
    pub oi_change_pct: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub funding_rate_avg_pct: Option<Decimal>,

    pub cvd: Decimal,
    pub cvd_delta: Decimal,
    pub cvd_normalized: Decimal,
    pub cvd_resolution: Timeframe,
    pub cvd_requested_timeframe: Timeframe,
    pub cvd_window_candles: usize,
    pub cvd_actual_candles: usize,
    pub cvd_data_complete: bool,
    pub cvd_market_impact_reliable: bool,
    pub cvd_reliable_for_tf: bool,
    pub cvd_data_reason: Option<CvdDataReason>,
    pub cvd_market_reason: Option<CvdMarketReason>,
    pub cvd_total_volume: Decimal,
    pub cvd_avg_volume_per_candle: Decimal,

    pub stale: bool,
    pub age_minutes: Option<f64>,
}

impl PerTimeframeSnapshot {
    /// Checks the invariant linking the two component reliability flags to
    /// the combined one; used by constructors and by tests, never bypassed.
    pub fn reliability_invariant_holds(&self) -> bool {
        self.cvd_reliable_for_tf == (self.cvd_data_complete && self.cvd_market_impact_reliable)
    }

    /// CVD is unreliable for T if the resolution used is coarser than T, the
    /// combined reliability flag is false, or the requested timeframe
    /// doesn't match T — the three CVD-gating conditions of §4.3.7.
    pub fn cvd_reliable_for_decision(&self, for_timeframe: Timeframe) -> bool {
        self.cvd_resolution == for_timeframe
            && self.cvd_requested_timeframe == for_timeframe
            && self.cvd_reliable_for_tf
    }
}

/// Ordered lookback history for one `(venue, interval)` pair. All three
/// vectors are sorted ascending by timestamp with no gap larger than one
/// interval beyond the configured tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookbackHistory {
    pub venue: Venue,
    pub interval: Timeframe,
    pub price_history: Vec<Candle>,
    pub oi_history: Vec<Candle>,
    pub funding_history: Vec<Candle>,
}

impl LookbackHistory {
    pub fn new(venue: Venue, interval: Timeframe) -> Self {
        Self {
            venue,
            interval,
            price_history: Vec::new(),
            oi_history: Vec::new(),
            funding_history: Vec::new(),
        }
    }
}
