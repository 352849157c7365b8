//! Analysis timeframes the engine runs per cycle.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four timeframes the Metrics Engine produces `TimeframeMetrics`
/// for. Ordered ascending; `ALL` is the canonical iteration order used by the
/// multi-timeframe aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum Timeframe {
    M30,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::M30, Timeframe::H1, Timeframe::H4, Timeframe::D1];

    pub fn interval_ms(&self) -> i64 {
        self.to_minutes() * 60_000
    }

    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    /// Vendor API interval string for requesting candles at this timeframe.
    pub fn vendor_interval(&self) -> &'static str {
        match self {
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "24h",
        }
    }

    /// The CVD resolution this timeframe requests — never coarser than
    /// itself, per the CVD windowing contract in §4.2.
    pub fn cvd_api_interval(&self) -> &'static str {
        self.vendor_interval()
    }

    /// `(windowCandles, minCandles)` for the CVD windowing table in §4.2.
    pub fn cvd_window(&self) -> (usize, usize) {
        match self {
            Timeframe::M30 => (48, 38),
            Timeframe::H1 => (24, 19),
            Timeframe::H4 => (18, 14),
            Timeframe::D1 => (14, 11),
        }
    }

    /// Minimum average USD volume per candle for `cvdMarketImpactReliable`.
    pub fn min_volume_threshold_usd(&self) -> rust_decimal::Decimal {
        use rust_decimal_macros::dec;
        match self {
            Timeframe::M30 => dec!(500_000),
            Timeframe::H1 => dec!(1_000_000),
            Timeframe::H4 => dec!(5_000_000),
            Timeframe::D1 => dec!(50_000_000),
        }
    }

    /// Is this one of the two "scalping" timeframes for whaleRetailRatio /
    /// CVD-gating purposes (§4.3.5, §4.3.7)?
    pub fn is_scalping(&self) -> bool {
        matches!(self, Timeframe::M30 | Timeframe::H1)
    }

    /// Rounds `timestamp_ms` down to the last fully closed candle boundary
    /// for this timeframe.
    pub fn align_end_to_last_closed(&self, timestamp_ms: i64) -> i64 {
        let period = self.interval_ms();
        (timestamp_ms / period) * period
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.vendor_interval())
    }
}

impl FromStr for Timeframe {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" | "24h" => Ok(Timeframe::D1),
            _ => Err(anyhow!(
                "Invalid timeframe: '{}'. Valid options: 30m, 1h, 4h, 1d",
                s
            )),
        }
    }
}
