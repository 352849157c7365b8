//! The Candle entity (§3): OHLC + OI + funding + taker buy/sell volume.

use crate::domain::market::timeframe::Timeframe;
use crate::domain::venue::Venue;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One closed candle for a `(venue, symbol, interval, timestamp)` key.
///
/// `timestamp` is the candle-open boundary; a row is only visible to the
/// rest of the pipeline after the candle has closed (the Data Service is
/// responsible for never handing out a still-open candle, not this type).
/// Volumes and `funding_rate` are `None` when the vendor did not record them
/// for that row — absence means "not recorded", never "zero".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub venue: Venue,
    pub symbol: String,
    pub interval: Timeframe,
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub oi: Option<Decimal>,
    pub funding_rate: Option<Decimal>,
    pub buy_volume: Option<Decimal>,
    pub sell_volume: Option<Decimal>,
}

impl Candle {
    /// The unique key identifying this row in the Historical-Candle Store.
    pub fn key(&self) -> (Venue, &str, Timeframe, i64) {
        (self.venue, self.symbol.as_str(), self.interval, self.timestamp)
    }

    /// Percentage change in `close` relative to `other`, e.g. `(self.close -
    /// other.close) / other.close * 100`. Returns `None` if `other.close` is
    /// zero (the candle carries no meaningful reference price).
    pub fn pct_change_from(&self, other: &Candle) -> Option<Decimal> {
        if other.close.is_zero() {
            return None;
        }
        Some((self.close - other.close) / other.close * Decimal::ONE_HUNDRED)
    }
}
